//! Temp-basal start/stop joining
//!
//! Pumps report a temporary basal as a series of sampled records that are
//! all `deliveryType: "temp"`; the end of the override is signalled by a
//! sample with zero duration. The joiner remembers the active temp and turns
//! that zero-duration sample into a discrete `temp-stop` event pointing back
//! at the temp it ends.

use crate::error::{ProcessorError, Result};
use crate::idify::Idifier;
use crate::operator::{link, Emitter, EventStream, Observer};
use crate::pipeline::SharedStats;
use futures::stream::Stream;
use ingest_types::{fields, Event, DELIVERY_TEMP_STOP};
use std::sync::Arc;
use tracing::{debug, trace};

/// Join state of one stream
#[derive(Debug, Clone, Default, PartialEq)]
pub enum JoinState {
    #[default]
    Idle,
    /// A temp basal is in effect
    Active(Box<Event>),
}

impl JoinState {
    pub fn is_active(&self) -> bool {
        matches!(self, JoinState::Active(_))
    }
}

/// Stateful joiner; one instance per partition, never shared
#[derive(Debug)]
pub struct TempBasalJoiner {
    state: JoinState,
    idifier: Arc<Idifier>,
    stats: Option<SharedStats>,
}

impl TempBasalJoiner {
    pub fn new(idifier: Arc<Idifier>) -> Self {
        Self {
            state: JoinState::Idle,
            idifier,
            stats: None,
        }
    }

    /// Record synthesized and dropped stops into `stats`
    pub fn with_stats(mut self, stats: SharedStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn state(&self) -> &JoinState {
        &self.state
    }

    /// Feed one event; returns the event to emit, if any
    ///
    /// Fails only when the active temp has no id and one cannot be computed.
    pub fn process(&mut self, event: Event) -> Result<Option<Event>> {
        if !event.is_temp_basal() {
            return Ok(Some(event));
        }

        let is_stop = matches!(event.duration(), Some(d) if d == 0.0);
        if !is_stop {
            trace!(ts = %event.ts_display(), "temp basal active");
            self.state = JoinState::Active(Box::new(event.clone()));
            return Ok(Some(event));
        }

        match std::mem::take(&mut self.state) {
            JoinState::Active(active) => {
                let temp_id = match active.id() {
                    Some(id) => id.to_string(),
                    None => self.idifier.compute_id(&active)?.into_string(),
                };
                let stop = stop_event(&event, temp_id);
                debug!(
                    ts = %stop.ts_display(),
                    temp_id = ?stop.get_str(fields::TEMP_ID),
                    "synthesized temp-basal stop"
                );
                if let Some(stats) = &self.stats {
                    stats.write().inc_temp_stops_synthesized();
                }
                Ok(Some(stop))
            }
            JoinState::Idle => {
                debug!(ts = %event.ts_display(), "dropping temp-basal stop with no active temp");
                if let Some(stats) = &self.stats {
                    stats.write().inc_orphan_stops_dropped();
                }
                Ok(None)
            }
        }
    }
}

fn stop_event(signal: &Event, temp_id: String) -> Event {
    let mut stop = Event::default();
    for field in [
        fields::TYPE,
        fields::TS,
        fields::DEVICE_TIME,
        fields::DEVICE_ID,
        fields::SOURCE,
    ] {
        if let Some(value) = signal.get(field) {
            stop.set(field, value.clone());
        }
    }
    stop.set(fields::DELIVERY_TYPE, DELIVERY_TEMP_STOP);
    stop.set(fields::TEMP_ID, temp_id);
    stop
}

/// Run a fresh [`TempBasalJoiner`] over `upstream`
pub fn join_temp_basals<S>(
    upstream: S,
    idifier: Arc<Idifier>,
    stats: Option<SharedStats>,
) -> EventStream<Event>
where
    S: Stream<Item = Result<Event>> + Send + 'static,
{
    let mut joiner = TempBasalJoiner::new(idifier);
    joiner.stats = stats;
    link(upstream, move |out| JoinStage { joiner, out })
}

struct JoinStage {
    joiner: TempBasalJoiner,
    out: Emitter<Event>,
}

impl Observer<Event> for JoinStage {
    fn on_next(&mut self, event: Event) {
        match self.joiner.process(event) {
            Ok(Some(event)) => self.out.next(event),
            Ok(None) => {}
            Err(error) => self.out.error(error),
        }
    }

    fn on_error(&mut self, error: ProcessorError) {
        self.out.error(error);
    }

    fn on_completed(&mut self) {
        if self.joiner.state().is_active() {
            trace!("stream completed with a temp basal still active");
        }
        self.out.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idify::EventId;
    use crate::pipeline::PipelineStats;
    use futures::{executor::block_on, stream, StreamExt};
    use ingest_types::{BASAL, DELIVERY_TEMP};

    fn temp(ts: i64, duration: i64) -> Event {
        Event::new(BASAL)
            .with(fields::DELIVERY_TYPE, DELIVERY_TEMP)
            .with(fields::DEVICE_ID, "d1")
            .with(fields::TS, ts)
            .with(fields::DURATION, duration)
    }

    fn joiner() -> TempBasalJoiner {
        TempBasalJoiner::new(Arc::new(Idifier::default()))
    }

    #[test]
    fn test_temp_then_stop() {
        let mut joiner = joiner();
        let start = joiner.process(temp(100, 30)).unwrap().unwrap();
        assert_eq!(start, temp(100, 30));
        assert!(joiner.state().is_active());

        let stop = joiner.process(temp(200, 0)).unwrap().unwrap();
        assert_eq!(stop.delivery_type(), Some(DELIVERY_TEMP_STOP));
        assert_eq!(stop.event_type(), Some(BASAL));
        assert_eq!(stop.device_id(), Some("d1"));
        assert_eq!(stop.get(fields::TS), Some(&serde_json::json!(200)));
        assert!(!stop.has(fields::DURATION));

        let expected = EventId::from_parts(["basal", "temp", "d1", "100"]);
        assert_eq!(stop.get_str(fields::TEMP_ID), Some(expected.as_str()));
        assert_eq!(joiner.state(), &JoinState::Idle);
    }

    #[test]
    fn test_existing_id_is_referenced() {
        let mut joiner = joiner();
        joiner.process(temp(100, 30).with(fields::ID, "abc")).unwrap();
        let stop = joiner.process(temp(200, 0)).unwrap().unwrap();
        assert_eq!(stop.get_str(fields::TEMP_ID), Some("abc"));
    }

    #[test]
    fn test_orphan_stop_is_dropped() {
        let stats = PipelineStats::shared();
        let mut joiner = joiner().with_stats(stats.clone());
        assert!(joiner.process(temp(200, 0)).unwrap().is_none());
        assert_eq!(joiner.state(), &JoinState::Idle);
        assert_eq!(stats.read().orphan_stops_dropped, 1);
    }

    #[test]
    fn test_newer_temp_replaces_active() {
        let mut joiner = joiner();
        joiner.process(temp(100, 30)).unwrap();
        joiner.process(temp(150, 60)).unwrap();
        let stop = joiner.process(temp(200, 0)).unwrap().unwrap();
        let expected = EventId::from_parts(["basal", "temp", "d1", "150"]);
        assert_eq!(stop.get_str(fields::TEMP_ID), Some(expected.as_str()));
    }

    #[test]
    fn test_other_events_pass_through() {
        let mut joiner = joiner();
        joiner.process(temp(100, 30)).unwrap();
        let smbg = Event::new("smbg").with(fields::TS, 120);
        assert_eq!(joiner.process(smbg.clone()).unwrap(), Some(smbg));
        let scheduled = Event::new(BASAL)
            .with(fields::DELIVERY_TYPE, "scheduled")
            .with(fields::DURATION, 0);
        assert_eq!(joiner.process(scheduled.clone()).unwrap(), Some(scheduled));
        assert!(joiner.state().is_active());
    }

    #[test]
    fn test_missing_duration_counts_as_start() {
        let mut joiner = joiner();
        let start = temp(100, 30).with(fields::DURATION, serde_json::Value::Null);
        joiner.process(start).unwrap();
        assert!(joiner.state().is_active());
    }

    #[test]
    fn test_unidentifiable_active_temp_fails_the_stop() {
        let mut joiner = joiner();
        let mut anonymous = temp(100, 30);
        anonymous.remove(fields::DEVICE_ID);
        joiner.process(anonymous).unwrap();
        assert!(matches!(
            joiner.process(temp(200, 0)),
            Err(ProcessorError::MissingField { .. })
        ));
    }

    #[test]
    fn test_join_stage_over_stream() {
        let stats = PipelineStats::shared();
        let items: Vec<Result<Event>> = vec![Ok(temp(50, 0)), Ok(temp(100, 30)), Ok(temp(200, 0))];
        let out: Vec<Event> = block_on(
            join_temp_basals(stream::iter(items), Arc::new(Idifier::default()), Some(stats.clone()))
                .map(|r| r.unwrap())
                .collect(),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].delivery_type(), Some(DELIVERY_TEMP_STOP));
        let snapshot = stats.read().clone();
        assert_eq!(snapshot.temp_stops_synthesized, 1);
        assert_eq!(snapshot.orphan_stops_dropped, 1);
    }
}
