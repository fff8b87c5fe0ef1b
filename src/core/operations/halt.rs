use crate::core::events::Event;
use crate::core::invoker::PowerAction;
use crate::core::options::HaltWait;
use crate::core::outcome::{HaltOutcome, MachineAction};
use crate::core::reporter::Reporter;
use crate::core::state::{MachineState, classify};
use crate::core::targets::TargetList;

use super::Fleet;

impl Fleet<'_> {
    /// Poll until every target has left the running set or `wait` elapses.
    ///
    /// Every `retry_every` polling cycles the stop command is re-sent with
    /// `method` to the machines still running. Retried stops are appended to
    /// `actions`.
    pub(super) fn await_halt(
        &mut self,
        targets: &TargetList,
        wait: HaltWait,
        method: PowerAction,
        reporter: &mut dyn Reporter,
        actions: &mut Vec<MachineAction>,
    ) -> HaltOutcome {
        if wait == HaltWait::Skip {
            return HaltOutcome::Skipped;
        }

        let started = self.clock.now();
        self.clock.sleep(self.timing.settle_delay);

        let mut cycles: u32 = 0;
        loop {
            let elapsed = self.clock.now().saturating_duration_since(started);
            let running = self.running(reporter);
            let remaining = classify(targets, &running, MachineState::Running).kept;
            if remaining.is_empty() {
                reporter.report(Event::HaltConfirmed);
                return HaltOutcome::Confirmed;
            }

            let seconds_left = match wait {
                HaltWait::Bounded(limit) if elapsed > limit => {
                    reporter.report(Event::HaltTimedOut {
                        remaining: remaining.as_slice().to_vec(),
                    });
                    return HaltOutcome::TimedOut;
                }
                HaltWait::Bounded(limit) => Some(limit.saturating_sub(elapsed).as_secs()),
                HaltWait::Unbounded | HaltWait::Skip => None,
            };
            reporter.report(Event::HaltWaiting {
                remaining: remaining.as_slice().to_vec(),
                seconds_left,
            });

            cycles += 1;
            if cycles % self.timing.retry_every == 0 {
                reporter.report(Event::StopRetried {
                    vms: remaining.as_slice().to_vec(),
                });
                for vm in &remaining {
                    actions.push(self.stop_one(vm, method, reporter));
                }
            }
            self.clock.sleep(self.timing.poll_interval);
        }
    }
}
