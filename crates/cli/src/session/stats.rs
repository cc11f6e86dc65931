//! Session statistics.

use std::time::Duration;

use observability::DeliveryStatsAggregator;

/// Statistics from a session run
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Sends rejected before reaching the transport
    pub rejected_sends: u64,

    /// Inbound messages injected by simulated watches
    pub inbound_sent: u64,

    /// Inbound messages answered with an ack
    pub inbound_acked: u64,

    /// Number of simulated watches connected
    pub watches: usize,

    pub duration: Duration,

    /// Per-target delivery outcomes
    pub deliveries: DeliveryStatsAggregator,
}

impl SessionStats {
    /// Target results per second
    pub fn results_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.deliveries.total_results as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Session Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Watches: {}", self.watches);
        println!("   ├─ Sends: {}", self.deliveries.total_sends);
        println!("   ├─ Rejected sends: {}", self.rejected_sends);
        println!("   └─ Results/s: {:.2}", self.results_per_sec());

        if self.inbound_sent > 0 {
            println!("\n📥 Inbound");
            println!("   ├─ Sent by watches: {}", self.inbound_sent);
            println!("   └─ Acked: {}", self.inbound_acked);
        }

        println!("\n{}", self.deliveries.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ReceiveResult;

    #[test]
    fn test_results_per_sec() {
        let mut stats = SessionStats {
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(stats.results_per_sec(), 0.0);

        for _ in 0..4 {
            stats.deliveries.update(&"w1".into(), &ReceiveResult::Ack, 1.0);
        }
        assert_eq!(stats.results_per_sec(), 2.0);
    }
}
