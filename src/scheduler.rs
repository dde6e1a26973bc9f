use anyhow::Result;
use tokio::time::{Duration, Instant, sleep_until};

pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(anyhow::anyhow!("Ping interval must be positive"));
        }
        Ok(Self { interval })
    }

    /// job: async closure for each tick, given the tick number. The first
    /// tick fires immediately.
    pub async fn run<J, F>(&self, mut job: J) -> Result<()>
    where
        J: FnMut(u64) -> F + Send + 'static,
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut next = Instant::now();
        let mut tick = 0;
        loop {
            next += self.interval;
            // spawn job so next tick unaffected by job duration
            tokio::spawn(job(tick));
            tick += 1;
            sleep_until(next).await;
        }
    }
}
