use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    /// Waiting for a typing pause that ends at `deadline`
    Armed { deadline: Instant },
    /// A request tagged `generation` is outstanding
    InFlight { generation: u64 },
}

/// Debounce state machine for completion requests.
///
/// Pure bookkeeping: the owner feeds it the current time and acts on what
/// it returns, which keeps it trivially testable and free of timers.
///
/// ```text
/// Idle --edit--> Armed --deadline--> InFlight --response--> Idle
///                  ^                    |
///                  +-------edit---------+   (the in-flight answer is now stale)
/// ```
#[derive(Debug, Clone)]
pub struct DebounceScheduler {
    delay: Duration,
    state: DebounceState,
    generation: u64,
}

impl DebounceScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: DebounceState::Idle,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// Generation of the most recently issued request
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A text-changing edit happened: (re)start the pause timer. Last edit wins.
    pub fn on_edit(&mut self, now: Instant) {
        self.state = DebounceState::Armed {
            deadline: now + self.delay,
        };
    }

    /// When the owner should call [`DebounceScheduler::poll`] next
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Armed { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Fire if the deadline has passed. Returns the generation to tag the
    /// new request with.
    pub fn poll(&mut self, now: Instant) -> Option<u64> {
        match self.state {
            DebounceState::Armed { deadline } if now >= deadline => {
                self.generation += 1;
                self.state = DebounceState::InFlight {
                    generation: self.generation,
                };
                log::debug!("Debounce fired, generation {}", self.generation);
                Some(self.generation)
            }
            _ => None,
        }
    }

    /// A response arrived. Returns whether it is current; stale responses
    /// leave the state untouched.
    pub fn on_response(&mut self, generation: u64) -> bool {
        match self.state {
            DebounceState::InFlight { generation: current } if current == generation => {
                self.state = DebounceState::Idle;
                true
            }
            _ => {
                log::debug!(
                    "Dropping stale completion, generation {generation} (current {})",
                    self.generation
                );
                false
            }
        }
    }

    /// Forget any pending fire or outstanding request
    pub fn cancel(&mut self) {
        self.state = DebounceState::Idle;
    }
}

impl Default for DebounceScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_fires_once_after_pause() {
        let start = Instant::now();
        let mut scheduler = DebounceScheduler::default();

        scheduler.on_edit(start);
        assert_eq!(scheduler.poll(start + ms(499)), None);
        assert_eq!(scheduler.poll(start + ms(500)), Some(1));
        assert_eq!(scheduler.state(), DebounceState::InFlight { generation: 1 });
        assert_eq!(scheduler.poll(start + ms(2000)), None);
    }

    #[test]
    fn test_last_edit_wins() {
        let start = Instant::now();
        let mut scheduler = DebounceScheduler::new(ms(100));

        scheduler.on_edit(start);
        scheduler.on_edit(start + ms(80));
        assert_eq!(scheduler.poll(start + ms(120)), None);
        assert_eq!(scheduler.deadline(), Some(start + ms(180)));
        assert_eq!(scheduler.poll(start + ms(180)), Some(1));
    }

    #[test]
    fn test_stale_response_is_dropped() {
        let start = Instant::now();
        let mut scheduler = DebounceScheduler::new(ms(100));

        scheduler.on_edit(start);
        let first = scheduler.poll(start + ms(100)).unwrap();

        // Typing resumes while the first request is in flight
        scheduler.on_edit(start + ms(150));
        assert!(!scheduler.on_response(first));
        assert!(matches!(scheduler.state(), DebounceState::Armed { .. }));

        let second = scheduler.poll(start + ms(250)).unwrap();
        assert_eq!(second, first + 1);
        assert!(!scheduler.on_response(first));
        assert!(scheduler.on_response(second));
        assert_eq!(scheduler.state(), DebounceState::Idle);
    }

    #[test]
    fn test_response_while_idle_is_dropped() {
        let mut scheduler = DebounceScheduler::default();
        assert!(!scheduler.on_response(0));
        assert!(!scheduler.on_response(1));
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut scheduler = DebounceScheduler::new(ms(10));
        scheduler.on_edit(start);
        scheduler.cancel();

        assert_eq!(scheduler.deadline(), None);
        assert_eq!(scheduler.poll(start + ms(50)), None);
    }
}
