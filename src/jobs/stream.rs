//! Per-observer progress streams.
//!
//! A [`JobStream`] is what `subscribe` hands to an observer: the job's
//! recorded history replayed first, then live events tailed from the
//! job's broadcast channel, ending with exactly one terminal event.
//! Each observer owns its own buffered receiver, so a slow or abandoned
//! observer never blocks the executor or other observers.

use std::collections::VecDeque;

use tokio::sync::broadcast;

use super::job::JobEvent;

pub struct JobStream {
    history: VecDeque<JobEvent>,
    live: Option<broadcast::Receiver<JobEvent>>,
}

impl JobStream {
    pub(crate) fn new(history: Vec<JobEvent>, live: Option<broadcast::Receiver<JobEvent>>) -> Self {
        Self {
            history: history.into(),
            live,
        }
    }

    /// Next event, or `None` once the stream is exhausted.
    ///
    /// The sequence is finite once the job is terminal: after yielding a
    /// [`JobEvent::Finished`] every further call returns `None`. An
    /// observer that lagged past the channel buffer loses the
    /// overwritten events (logged) but keeps receiving from where the
    /// buffer resumes — delivery is best-effort by design.
    pub async fn next(&mut self) -> Option<JobEvent> {
        if let Some(event) = self.history.pop_front() {
            if matches!(event, JobEvent::Finished { .. }) {
                self.live = None;
            }
            return Some(event);
        }

        let event = loop {
            let live = self.live.as_mut()?;
            match live.recv().await {
                Ok(event) => break event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "observer lagged behind the event buffer");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.live = None;
                    return None;
                }
            }
        };

        if matches!(event, JobEvent::Finished { .. }) {
            self.live = None;
        }
        Some(event)
    }

    /// Drain the stream to completion, collecting every event.
    pub async fn collect(mut self) -> Vec<JobEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{JobSpec, SpecDefaults, parse};
    use crate::jobs::job::{JobReport, JobState};
    use crate::jobs::registry::JobRegistry;

    fn spec() -> JobSpec {
        JobSpec::from_command(&parse("/train --epochs=3"), &SpecDefaults::default()).unwrap()
    }

    fn report() -> JobReport {
        JobReport {
            summary: "ok".into(),
            metrics: Default::default(),
            artifacts: Vec::new(),
        }
    }

    #[tokio::test]
    async fn live_subscriber_sees_events_in_append_order() {
        let reg = JobRegistry::new(16, 10);
        let job = reg.create(spec(), "u");
        reg.mark_started(&job.id);

        let stream = reg.subscribe(&job.id).unwrap();

        reg.append_progress(&job.id, 33.3, "epoch 1/3");
        reg.append_progress(&job.id, 66.6, "epoch 2/3");
        reg.append_progress(&job.id, 100.0, "epoch 3/3");
        reg.complete(&job.id, report());

        let events = stream.collect().await;
        assert_eq!(events.len(), 4);
        let percents: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                JobEvent::Progress(p) => Some(p.percent),
                JobEvent::Finished { .. } => None,
            })
            .collect();
        assert_eq!(percents, vec![33.3, 66.6, 100.0]);
        assert!(matches!(
            events.last(),
            Some(JobEvent::Finished {
                state: JobState::Succeeded,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn late_subscriber_replays_full_history_then_closes() {
        let reg = JobRegistry::new(16, 10);
        let job = reg.create(spec(), "u");
        reg.mark_started(&job.id);
        reg.append_progress(&job.id, 50.0, "epoch 1/2");
        reg.append_progress(&job.id, 100.0, "epoch 2/2");
        reg.complete(&job.id, report());

        // Subscribe only after the job is already terminal.
        let mut stream = reg.subscribe(&job.id).unwrap();

        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        let third = stream.next().await.unwrap();
        assert!(matches!(first, JobEvent::Progress(ref p) if p.percent == 50.0));
        assert!(matches!(second, JobEvent::Progress(ref p) if p.percent == 100.0));
        match third {
            JobEvent::Finished { state, result, .. } => {
                assert_eq!(state, JobState::Succeeded);
                assert_eq!(result.unwrap().summary, "ok");
            }
            other => panic!("expected terminal event, got {other:?}"),
        }
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn mid_run_subscriber_gets_history_then_live_tail() {
        let reg = JobRegistry::new(16, 10);
        let job = reg.create(spec(), "u");
        reg.mark_started(&job.id);
        reg.append_progress(&job.id, 25.0, "epoch 1/4");

        let stream = reg.subscribe(&job.id).unwrap();

        reg.append_progress(&job.id, 50.0, "epoch 2/4");
        reg.complete(&job.id, report());

        let events = stream.collect().await;
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], JobEvent::Progress(p) if p.percent == 25.0));
        assert!(matches!(&events[1], JobEvent::Progress(p) if p.percent == 50.0));
        assert!(matches!(&events[2], JobEvent::Finished { .. }));
    }

    #[tokio::test]
    async fn dropping_one_observer_does_not_affect_another() {
        let reg = JobRegistry::new(16, 10);
        let job = reg.create(spec(), "u");
        reg.mark_started(&job.id);

        let dropped = reg.subscribe(&job.id).unwrap();
        let kept = reg.subscribe(&job.id).unwrap();
        drop(dropped);

        reg.append_progress(&job.id, 100.0, "epoch 1/1");
        reg.complete(&job.id, report());

        let events = kept.collect().await;
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn lagged_observer_resumes_with_newest_events() {
        // Tiny buffer: the observer sleeps through most of the run and
        // loses the overwritten middle, but still sees the tail.
        let reg = JobRegistry::new(2, 10);
        let job = reg.create(spec(), "u");
        reg.mark_started(&job.id);

        let mut stream = reg.subscribe(&job.id).unwrap();

        for i in 1..=4 {
            reg.append_progress(&job.id, f64::from(i) * 25.0, format!("epoch {i}/4"));
        }
        reg.complete(&job.id, report());

        // Buffer holds the last two events: the 100% append and the
        // terminal event.
        let first = stream.next().await.unwrap();
        assert!(matches!(first, JobEvent::Progress(ref p) if p.percent == 100.0));
        assert!(matches!(
            stream.next().await,
            Some(JobEvent::Finished { .. })
        ));
        assert!(stream.next().await.is_none());
    }
}
