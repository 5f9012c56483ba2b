//! Single-threaded listener container (C7, §4.1). Owns exactly one consumer
//! and one OS thread (via `tokio::task::spawn_blocking`, mirroring the host
//! project's convention of confining a blocking, non-reentrant client to a
//! dedicated thread). External requests cross in through a lock-free
//! `std::sync::mpsc` command queue drained once per iteration.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, error, info_span, warn};

use crate::ack::{AckSignal, Acknowledgment};
use crate::client::traits::{Consumer, ConsumerFactory, ProducerRecord, RebalanceEvent};
use crate::container::command::Command;
use crate::error::ContainerError;
use crate::error_handler::{Decision, ErrorHandlerPipeline};
use crate::events::{ContainerEvent, Event, EventPublisher, TracingEventPublisher};
use crate::interceptor::{BatchInterceptor, RecordInterceptor};
use crate::listener::{BoxedListenerError, Dispatcher, GenericListenerError, Listener, ListenerContext};
use crate::model::{ContainerProperties, OffsetAndMetadata, TopicPartition};
use crate::offset_tracker::OffsetTracker;
use crate::producer_factory::ProducerFactory;
use crate::rebalance::{NoOpRebalanceListener, RebalanceListener};
use crate::record::{ConsumerRecord, ConsumerRecords};
use crate::seek::{drain_pending, SeekCallback};

/// A record held in memory after a retryable failure with
/// `seeksAfterHandling=false`: redelivered once `ready_at` passes, without
/// seeking or touching the consumer's committed position.
struct RetainedRecord {
    record: ConsumerRecord,
    ready_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Configuration the container needs beyond the plain `ContainerProperties`
/// data model: the collaborators injected at construction time.
pub struct SingleThreadedContainer {
    id: String,
    properties: ContainerProperties,
    consumer_factory: Arc<dyn ConsumerFactory>,
    listener: Arc<Listener>,
    rebalance_listener: Arc<dyn RebalanceListener>,
    event_publisher: Arc<dyn EventPublisher>,
    error_handler: Arc<Mutex<ErrorHandlerPipeline>>,
    producer_factory: Option<Arc<ProducerFactory>>,
    record_interceptor: Option<Arc<dyn RecordInterceptor>>,
    batch_interceptor: Option<Arc<dyn BatchInterceptor>>,
    state: Arc<Mutex<ContainerState>>,
    command_tx: Mutex<Option<Sender<Command>>>,
    last_poll_at_ms: Arc<AtomicI64>,
    join_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    monitor_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    /// Live partition assignment, published by the poll thread on every
    /// rebalance so `assignment()` reflects reality instead of the static
    /// subscription config.
    assignment: Arc<Mutex<Vec<TopicPartition>>>,
}

impl SingleThreadedContainer {
    pub fn new(
        id: impl Into<String>,
        properties: ContainerProperties,
        consumer_factory: Arc<dyn ConsumerFactory>,
        listener: Listener,
        error_handler: ErrorHandlerPipeline,
    ) -> Self {
        Self {
            id: id.into(),
            properties,
            consumer_factory,
            listener: Arc::new(listener),
            rebalance_listener: Arc::new(NoOpRebalanceListener),
            event_publisher: Arc::new(TracingEventPublisher),
            error_handler: Arc::new(Mutex::new(error_handler)),
            producer_factory: None,
            record_interceptor: None,
            batch_interceptor: None,
            state: Arc::new(Mutex::new(ContainerState::Stopped)),
            command_tx: Mutex::new(None),
            last_poll_at_ms: Arc::new(AtomicI64::new(now_millis())),
            join_handle: Mutex::new(None),
            monitor_handle: Mutex::new(None),
            assignment: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_rebalance_listener(mut self, listener: Arc<dyn RebalanceListener>) -> Self {
        self.rebalance_listener = listener;
        self
    }

    pub fn with_event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = publisher;
        self
    }

    pub fn with_producer_factory(mut self, factory: Arc<ProducerFactory>) -> Self {
        self.producer_factory = Some(factory);
        self
    }

    pub fn with_record_interceptor(mut self, interceptor: Arc<dyn RecordInterceptor>) -> Self {
        self.record_interceptor = Some(interceptor);
        self
    }

    pub fn with_batch_interceptor(mut self, interceptor: Arc<dyn BatchInterceptor>) -> Self {
        self.batch_interceptor = Some(interceptor);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ContainerState {
        *self.state.lock().unwrap()
    }

    /// Live partition assignment as of the most recent rebalance observed by
    /// the poll thread; empty before the first assignment or after a stop.
    pub fn assignment(&self) -> Vec<TopicPartition> {
        self.assignment.lock().unwrap().clone()
    }

    /// Idempotent: a second `start()` while already starting/running is a
    /// no-op.
    pub async fn start(&self) -> Result<(), ContainerError> {
        {
            let mut state = self.state.lock().unwrap();
            if *state != ContainerState::Stopped {
                return Ok(());
            }
            *state = ContainerState::Starting;
        }
        self.event_publisher
            .publish(Event::new(self.id.clone(), ContainerEvent::Starting));

        let client_id_suffix = self.id.clone();
        let consumer = self.consumer_factory.create(
            &self.properties.group_id,
            &self.properties.client_id_prefix,
            &client_id_suffix,
        );
        let mut consumer = match consumer {
            Ok(c) => c,
            Err(e) => {
                *self.state.lock().unwrap() = ContainerState::Stopped;
                self.event_publisher.publish(Event::new(
                    self.id.clone(),
                    ContainerEvent::FailedToStart { reason: e.to_string() },
                ));
                return Err(e);
            }
        };

        if let Err(e) = consumer.subscribe(&self.properties) {
            *self.state.lock().unwrap() = ContainerState::Stopped;
            self.event_publisher.publish(Event::new(
                self.id.clone(),
                ContainerEvent::FailedToStart { reason: e.to_string() },
            ));
            return Err(e);
        }

        let (tx, rx) = std::sync::mpsc::channel();
        *self.command_tx.lock().unwrap() = Some(tx);

        *self.state.lock().unwrap() = ContainerState::Running;
        self.event_publisher
            .publish(Event::new(self.id.clone(), ContainerEvent::Started));

        let loop_ctx = LoopContext {
            id: self.id.clone(),
            properties: self.properties.clone(),
            listener: self.listener.clone(),
            rebalance_listener: self.rebalance_listener.clone(),
            event_publisher: self.event_publisher.clone(),
            error_handler: self.error_handler.clone(),
            producer_factory: self.producer_factory.clone(),
            record_interceptor: self.record_interceptor.clone(),
            batch_interceptor: self.batch_interceptor.clone(),
            state: self.state.clone(),
            last_poll_at_ms: self.last_poll_at_ms.clone(),
            assignment: self.assignment.clone(),
        };
        let rt = tokio::runtime::Handle::current();
        let join = tokio::task::spawn_blocking(move || run_poll_loop(consumer, rx, loop_ctx, rt));
        *self.join_handle.lock().unwrap() = Some(join);

        let monitor = self.spawn_monitor();
        *self.monitor_handle.lock().unwrap() = Some(monitor);

        Ok(())
    }

    fn spawn_monitor(&self) -> tokio::task::JoinHandle<()> {
        let id = self.id.clone();
        let properties = self.properties.clone();
        let event_publisher = self.event_publisher.clone();
        let last_poll_at_ms = self.last_poll_at_ms.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(properties.monitor_interval).await;
                if *state.lock().unwrap() != ContainerState::Running {
                    break;
                }
                let elapsed = now_millis() - last_poll_at_ms.load(Ordering::Relaxed);
                let threshold =
                    (properties.poll_timeout.as_millis() as f64 * properties.no_poll_threshold) as i64;
                if elapsed > threshold {
                    event_publisher.publish(Event::new(
                        id.clone(),
                        ContainerEvent::NonResponsive {
                            time_since_last_poll_ms: elapsed.max(0) as u64,
                        },
                    ));
                }
            }
        })
    }

    pub async fn stop(&self, timeout: Duration) {
        {
            let mut state = self.state.lock().unwrap();
            if *state == ContainerState::Stopped {
                return;
            }
            *state = ContainerState::Stopping;
        }
        if let Some(tx) = self.command_tx.lock().unwrap().as_ref() {
            drop(tx.send(Command::Stop));
        }
        let handle = self.join_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            drop(tokio::time::timeout(timeout, handle).await);
        }
        if let Some(monitor) = self.monitor_handle.lock().unwrap().take() {
            monitor.abort();
        }
        *self.state.lock().unwrap() = ContainerState::Stopped;
        self.assignment.lock().unwrap().clear();
        self.event_publisher
            .publish(Event::new(self.id.clone(), ContainerEvent::Stopped));
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    pub fn resume(&self) {
        self.send(Command::Resume);
    }

    pub fn pause_partition(&self, partition: TopicPartition) {
        self.send(Command::PausePartition(partition));
    }

    pub fn resume_partition(&self, partition: TopicPartition) {
        self.send(Command::ResumePartition(partition));
    }

    fn send(&self, command: Command) {
        if let Some(tx) = self.command_tx.lock().unwrap().as_ref() {
            drop(tx.send(command));
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

struct LoopContext {
    id: String,
    properties: ContainerProperties,
    listener: Arc<Listener>,
    rebalance_listener: Arc<dyn RebalanceListener>,
    event_publisher: Arc<dyn EventPublisher>,
    error_handler: Arc<Mutex<ErrorHandlerPipeline>>,
    producer_factory: Option<Arc<ProducerFactory>>,
    record_interceptor: Option<Arc<dyn RecordInterceptor>>,
    batch_interceptor: Option<Arc<dyn BatchInterceptor>>,
    state: Arc<Mutex<ContainerState>>,
    last_poll_at_ms: Arc<AtomicI64>,
    assignment: Arc<Mutex<Vec<TopicPartition>>>,
}

fn run_poll_loop(mut consumer: Box<dyn Consumer>, rx: Receiver<Command>, ctx: LoopContext, rt: tokio::runtime::Handle) {
    let mut offset_tracker = OffsetTracker::new(ctx.properties.async_acks);
    let (seek_callback, seek_receiver) = SeekCallback::new();
    let (ack_tx, mut ack_rx) = tokio::sync::mpsc::unbounded_channel::<AckSignal>();
    let mut container_paused = false;
    let mut assigned: Vec<TopicPartition> = Vec::new();
    let mut paused_partitions: HashSet<TopicPartition> = HashSet::new();
    let mut first_assignment_seen = false;
    let mut in_flight_records: HashMap<(TopicPartition, i64), ConsumerRecord> = HashMap::new();
    let mut remaining_records: Vec<RetainedRecord> = Vec::new();
    let mut retained_pause: HashSet<TopicPartition> = HashSet::new();
    let mut idle_since: Option<Instant> = None;
    let mut seen_any_data = false;

    'poll: loop {
        let mut stop_requested = false;
        for cmd in rx.try_iter() {
            match cmd {
                Command::Stop => stop_requested = true,
                Command::Pause => {
                    container_paused = true;
                    drop(consumer.pause(&assigned));
                }
                Command::Resume => {
                    container_paused = false;
                    drop(consumer.resume(&assigned));
                }
                Command::PausePartition(tp) => {
                    paused_partitions.insert(tp.clone());
                    if assigned.contains(&tp) {
                        drop(consumer.pause(std::slice::from_ref(&tp)));
                    }
                }
                Command::ResumePartition(tp) => {
                    paused_partitions.remove(&tp);
                    if assigned.contains(&tp) {
                        drop(consumer.resume(std::slice::from_ref(&tp)));
                    }
                }
            }
        }
        if stop_requested && ctx.properties.stop_immediate {
            break 'poll;
        }

        while let Ok(signal) = ack_rx.try_recv() {
            process_ack_signal(
                signal,
                &mut *consumer,
                &ctx,
                &mut offset_tracker,
                &rt,
                &mut in_flight_records,
                &mut remaining_records,
            );
        }
        if ctx.properties.ack_mode.is_manual() {
            commit_pending(&mut *consumer, &ctx, &mut offset_tracker);
        }
        reconcile_gap_pauses(&mut *consumer, &mut offset_tracker, &paused_partitions, &retained_pause);

        for req in drain_pending(&seek_receiver) {
            apply_seek(&mut *consumer, req);
        }

        if stop_requested {
            break 'poll;
        }

        let ready: Vec<ConsumerRecord> = {
            let now = Instant::now();
            let (ready, pending): (Vec<_>, Vec<_>) =
                remaining_records.drain(..).partition(|r| r.ready_at <= now);
            remaining_records = pending;
            ready.into_iter().map(|r| r.record).collect()
        };
        if !ready.is_empty() {
            dispatch_batch(
                ConsumerRecords { records: ready },
                &mut *consumer,
                &ctx,
                &mut offset_tracker,
                &ack_tx,
                &mut ack_rx,
                &seek_callback,
                &rt,
                &mut in_flight_records,
                &mut remaining_records,
            );
            reconcile_retain_pauses(&mut *consumer, &remaining_records, &mut retained_pause, &paused_partitions);
            reconcile_gap_pauses(&mut *consumer, &mut offset_tracker, &paused_partitions, &retained_pause);
        }

        let span = info_span!("poll_iteration", container_id = %ctx.id);
        let _guard = span.enter();

        let timeout = if container_paused {
            ctx.properties.poll_timeout_while_paused
        } else {
            ctx.properties.poll_timeout
        };

        let outcome = match consumer.poll(timeout) {
            Ok(o) => o,
            Err(e) => {
                error!(error = %e, "poll failed");
                break 'poll;
            }
        };
        ctx.last_poll_at_ms.store(now_millis(), Ordering::Relaxed);

        for rebalance in outcome.rebalance {
            handle_rebalance(
                rebalance,
                &mut *consumer,
                &ctx,
                &mut offset_tracker,
                &mut assigned,
                &paused_partitions,
                &mut remaining_records,
                &mut retained_pause,
            );
        }
        *ctx.assignment.lock().unwrap() = assigned.clone();

        if outcome.records.is_empty() {
            note_idle(&mut idle_since, seen_any_data, &ctx);
            continue 'poll;
        }
        seen_any_data = true;
        idle_since = None;

        for record in &outcome.records.records {
            offset_tracker.record_delivery(&record.partition, record.offset);
        }

        dispatch_batch(
            outcome.records,
            &mut *consumer,
            &ctx,
            &mut offset_tracker,
            &ack_tx,
            &mut ack_rx,
            &seek_callback,
            &rt,
            &mut in_flight_records,
            &mut remaining_records,
        );
        reconcile_retain_pauses(&mut *consumer, &remaining_records, &mut retained_pause, &paused_partitions);
        reconcile_gap_pauses(&mut *consumer, &mut offset_tracker, &paused_partitions, &retained_pause);
    }

    consumer.close(ctx.properties.shutdown_timeout);
}

fn note_idle(idle_since: &mut Option<Instant>, seen_any_data: bool, ctx: &LoopContext) {
    let Some(interval) = ctx.properties.idle_event_interval else {
        return;
    };
    let threshold = if seen_any_data {
        interval
    } else {
        interval * ctx.properties.idle_before_data_multiplier
    };
    let started = idle_since.get_or_insert_with(Instant::now);
    if started.elapsed() >= threshold {
        ctx.event_publisher
            .publish(Event::new(ctx.id.clone(), ContainerEvent::Idle { partitions: Vec::new() }));
        *idle_since = Some(Instant::now());
    }
}

fn apply_seek(consumer: &mut dyn Consumer, req: crate::seek::SeekRequest) {
    use crate::seek::SeekRequest::*;
    match req {
        Absolute { partition, offset } => {
            drop(consumer.seek(&partition, offset));
        }
        Relative { partition, delta } => {
            if let Ok(pos) = consumer.position(&partition) {
                drop(consumer.seek(&partition, pos + delta));
            }
        }
        ToBeginning { partition } => {
            drop(consumer.seek_to_beginning(&[partition]));
        }
        ToEnd { partition } => {
            drop(consumer.seek_to_end(&[partition]));
        }
        ToTimestamp { partition, .. } => {
            // The `Consumer` trait has no `offsets_for_times`; timestamp
            // seeks fall back to the current position until that is added.
            warn!(partition = %partition, "seek-to-timestamp not supported by this consumer adapter");
        }
    }
}

/// Processes one ack-channel signal. `Ack` advances the offset tracker as
/// before; `Nack` (§3: "routes to... a pause-and-retry signal") recovers the
/// original record from `in_flight_records` and runs it through the same
/// decision path as a listener error, instead of merely logging it.
fn process_ack_signal(
    signal: AckSignal,
    consumer: &mut dyn Consumer,
    ctx: &LoopContext,
    offset_tracker: &mut OffsetTracker,
    rt: &tokio::runtime::Handle,
    in_flight_records: &mut HashMap<(TopicPartition, i64), ConsumerRecord>,
    remaining_records: &mut Vec<RetainedRecord>,
) {
    match signal {
        AckSignal::Ack { partition, offset } => {
            in_flight_records.remove(&(partition.clone(), offset));
            offset_tracker.record_ack(&partition, offset);
        }
        AckSignal::Nack { partition, offset, reason } => {
            match in_flight_records.remove(&(partition.clone(), offset)) {
                Some(record) => {
                    warn!(partition = %partition, offset, reason, "listener nacked record");
                    let error: BoxedListenerError = Box::new(GenericListenerError::new("ManualNack", reason));
                    handle_listener_error(record, error, consumer, ctx, offset_tracker, rt, remaining_records);
                }
                None => {
                    warn!(
                        partition = %partition,
                        offset,
                        reason,
                        "nack received for a record no longer tracked in-flight; dropping"
                    );
                }
            }
        }
    }
}

/// Translates `OffsetTracker::sync_gap_pauses` into real broker pause/resume
/// calls, skipping a resume for any partition still held paused by the user
/// or by an in-memory retained record (§4.3).
fn reconcile_gap_pauses(
    consumer: &mut dyn Consumer,
    offset_tracker: &mut OffsetTracker,
    paused_partitions: &HashSet<TopicPartition>,
    retained_pause: &HashSet<TopicPartition>,
) {
    let (to_pause, to_resume) = offset_tracker.sync_gap_pauses();
    if !to_pause.is_empty() {
        drop(consumer.pause(&to_pause));
    }
    let to_resume: Vec<TopicPartition> = to_resume
        .into_iter()
        .filter(|tp| !paused_partitions.contains(tp) && !retained_pause.contains(tp))
        .collect();
    if !to_resume.is_empty() {
        drop(consumer.resume(&to_resume));
    }
}

/// Reconciles `retained_pause` against what `remaining_records` currently
/// holds: pauses newly-retaining partitions, resumes ones whose retained
/// record was just redelivered (unless still paused for another reason).
fn reconcile_retain_pauses(
    consumer: &mut dyn Consumer,
    remaining_records: &[RetainedRecord],
    retained_pause: &mut HashSet<TopicPartition>,
    paused_partitions: &HashSet<TopicPartition>,
) {
    let still_held: HashSet<TopicPartition> = remaining_records.iter().map(|r| r.record.partition.clone()).collect();

    let newly_held: Vec<TopicPartition> = still_held.difference(retained_pause).cloned().collect();
    if !newly_held.is_empty() {
        drop(consumer.pause(&newly_held));
    }

    let cleared: Vec<TopicPartition> = retained_pause.difference(&still_held).cloned().collect();
    for tp in &cleared {
        if !paused_partitions.contains(tp) {
            drop(consumer.resume(std::slice::from_ref(tp)));
        }
    }

    *retained_pause = still_held;
}

fn handle_rebalance(
    event: RebalanceEvent,
    consumer: &mut dyn Consumer,
    ctx: &LoopContext,
    offset_tracker: &mut OffsetTracker,
    assigned: &mut Vec<TopicPartition>,
    paused_partitions: &HashSet<TopicPartition>,
    remaining_records: &mut Vec<RetainedRecord>,
    retained_pause: &mut HashSet<TopicPartition>,
) {
    match event {
        RebalanceEvent::Assigned(partitions) => {
            for tp in &partitions {
                offset_tracker.on_partition_assigned(tp.clone());
                if !assigned.contains(tp) {
                    assigned.push(tp.clone());
                }
                if paused_partitions.contains(tp) {
                    drop(consumer.pause(std::slice::from_ref(tp)));
                }
            }
            ctx.rebalance_listener.on_partitions_assigned(&partitions);
            maybe_commit_on_assignment(consumer, ctx, &partitions);
            ctx.event_publisher.publish(Event::new(
                ctx.id.clone(),
                ContainerEvent::RebalanceAssigned { partitions },
            ));
        }
        RebalanceEvent::Revoked(partitions) => {
            ctx.rebalance_listener.on_partitions_revoked_before_commit(&partitions);
            let to_commit: Vec<(TopicPartition, OffsetAndMetadata)> = partitions
                .iter()
                .filter_map(|tp| offset_tracker.pending_commit_before_revoke(tp).map(|o| (tp.clone(), o)))
                .collect();
            if !to_commit.is_empty() {
                match consumer.commit_sync(&to_commit, ctx.properties.sync_commit_timeout) {
                    Ok(()) => {
                        for (tp, o) in &to_commit {
                            offset_tracker.mark_committed(tp, o.offset);
                        }
                    }
                    Err(e) => warn!(error = %e, "commit on revoke failed"),
                }
            }
            ctx.rebalance_listener.on_partitions_revoked_after_commit(&partitions);
            for tp in &partitions {
                offset_tracker.drop_partition(tp);
                assigned.retain(|a| a != tp);
            }
            remaining_records.retain(|r| !partitions.contains(&r.record.partition));
            retained_pause.retain(|tp| !partitions.contains(tp));
            ctx.event_publisher.publish(Event::new(
                ctx.id.clone(),
                ContainerEvent::RebalanceRevoked { partitions },
            ));
        }
        RebalanceEvent::Lost(partitions) => {
            // §9 open question: never commits, never routes through revoke.
            ctx.rebalance_listener.on_partitions_lost(&partitions);
            for tp in &partitions {
                offset_tracker.drop_partition(tp);
                assigned.retain(|a| a != tp);
            }
            remaining_records.retain(|r| !partitions.contains(&r.record.partition));
            retained_pause.retain(|tp| !partitions.contains(tp));
            ctx.event_publisher.publish(Event::new(
                ctx.id.clone(),
                ContainerEvent::RebalanceLost { partitions },
            ));
        }
    }
}

fn maybe_commit_on_assignment(consumer: &mut dyn Consumer, ctx: &LoopContext, partitions: &[TopicPartition]) {
    let option = ctx.properties.assignment_commit_option;
    if option.never_commits() {
        return;
    }
    if option.applies_only_to_latest_reset() && !consumer.reset_policy_is_latest() {
        return;
    }
    let committed = consumer.committed(partitions, ctx.properties.sync_commit_timeout).unwrap_or_default();
    let mut to_commit = Vec::new();
    for tp in partitions {
        if committed.contains_key(tp) {
            continue;
        }
        if let Ok(pos) = consumer.position(tp) {
            to_commit.push((tp.clone(), OffsetAndMetadata::new(pos)));
        }
    }
    if to_commit.is_empty() {
        return;
    }
    if let Err(e) = consumer.commit_sync(&to_commit, ctx.properties.sync_commit_timeout) {
        warn!(error = %e, "initial assignment commit failed");
    }
}

/// Dispatch one poll's worth of records to the listener, per the configured
/// `Dispatcher`, then ack/commit per the ack mode.
#[allow(clippy::too_many_arguments)]
fn dispatch_batch(
    records: ConsumerRecords,
    consumer: &mut dyn Consumer,
    ctx: &LoopContext,
    offset_tracker: &mut OffsetTracker,
    ack_tx: &tokio::sync::mpsc::UnboundedSender<AckSignal>,
    ack_rx: &mut tokio::sync::mpsc::UnboundedReceiver<AckSignal>,
    seek_callback: &SeekCallback,
    rt: &tokio::runtime::Handle,
    in_flight_records: &mut HashMap<(TopicPartition, i64), ConsumerRecord>,
    remaining_records: &mut Vec<RetainedRecord>,
) {
    match ctx.listener.dispatcher() {
        Dispatcher::SingleRecord => {
            for record in records.records {
                dispatch_one_record(
                    record,
                    consumer,
                    ctx,
                    offset_tracker,
                    ack_tx,
                    ack_rx,
                    seek_callback,
                    rt,
                    in_flight_records,
                    remaining_records,
                );
            }
        }
        Dispatcher::Batch => {
            dispatch_whole_batch(records, consumer, ctx, offset_tracker, ack_tx, seek_callback, rt, remaining_records);
        }
        Dispatcher::SubBatchPerPartition => {
            for (tp, group) in records.by_partition() {
                let sub = ConsumerRecords {
                    records: group.into_iter().cloned().collect(),
                };
                let _ = &tp;
                dispatch_whole_batch(sub, consumer, ctx, offset_tracker, ack_tx, seek_callback, rt, remaining_records);
            }
        }
    }

    if !ctx.properties.ack_mode.is_manual() {
        commit_pending(consumer, ctx, offset_tracker);
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch_one_record(
    record: ConsumerRecord,
    consumer: &mut dyn Consumer,
    ctx: &LoopContext,
    offset_tracker: &mut OffsetTracker,
    ack_tx: &tokio::sync::mpsc::UnboundedSender<AckSignal>,
    ack_rx: &mut tokio::sync::mpsc::UnboundedReceiver<AckSignal>,
    seek_callback: &SeekCallback,
    rt: &tokio::runtime::Handle,
    in_flight_records: &mut HashMap<(TopicPartition, i64), ConsumerRecord>,
    remaining_records: &mut Vec<RetainedRecord>,
) {
    let Listener::Record(listener) = ctx.listener.as_ref() else {
        warn!("non-record listener registered with single-record dispatcher; skipping");
        return;
    };

    let record = match apply_record_interceptor(record, ctx, rt) {
        Some(r) => r,
        None => return,
    };

    let partition = record.partition.clone();
    let offset = record.offset;
    let flags = listener.flags();
    let manual = ctx.properties.ack_mode.is_manual();
    let ack = if manual || flags.needs_ack {
        if manual {
            in_flight_records.insert((partition.clone(), offset), record.clone());
        }
        Some(Acknowledgment::new(
            partition.clone(),
            offset,
            ack_tx.clone(),
            ctx.properties.ack_mode.commits_immediately_from_ack_handle(),
        ))
    } else {
        None
    };
    // Read back from the handle itself rather than re-deriving from
    // `ack_mode`, so MANUAL_IMMEDIATE's distinct commit timing is actually
    // driven by what the listener was handed.
    let immediate = ack.as_ref().map(Acknowledgment::is_immediate).unwrap_or(false);
    let lctx = ListenerContext {
        ack,
        seek: seek_callback.clone(),
    };

    let result = rt.block_on(listener.on_message(record.clone(), lctx));
    match result {
        Ok(()) => {
            if let Some(interceptor) = &ctx.record_interceptor {
                rt.block_on(interceptor.success(&record));
            }
            if !manual {
                offset_tracker.record_ack(&partition, offset);
            }
        }
        Err(e) => {
            if let Some(interceptor) = &ctx.record_interceptor {
                rt.block_on(interceptor.failure(&record, &e));
            }
            in_flight_records.remove(&(partition.clone(), offset));
            handle_listener_error(record, e, consumer, ctx, offset_tracker, rt, remaining_records);
        }
    }

    // MANUAL_IMMEDIATE commits directly on the poll thread instead of
    // waiting for the next poll-loop boundary (§3 AckMode, §4.3): drain
    // whatever the listener just sent through the ack handle right now.
    if manual && immediate {
        while let Ok(signal) = ack_rx.try_recv() {
            process_ack_signal(signal, consumer, ctx, offset_tracker, rt, in_flight_records, remaining_records);
        }
        commit_pending(consumer, ctx, offset_tracker);
    }
}

fn dispatch_whole_batch(
    records: ConsumerRecords,
    consumer: &mut dyn Consumer,
    ctx: &LoopContext,
    offset_tracker: &mut OffsetTracker,
    _ack_tx: &tokio::sync::mpsc::UnboundedSender<AckSignal>,
    seek_callback: &SeekCallback,
    rt: &tokio::runtime::Handle,
    remaining_records: &mut Vec<RetainedRecord>,
) {
    let listener = match ctx.listener.as_ref() {
        Listener::Batch(l) | Listener::SubBatchPerPartition(l) => l,
        Listener::Record(_) => {
            warn!("record listener registered with batch dispatcher; skipping");
            return;
        }
    };

    let highest_per_partition = highest_offsets(&records);

    let records = match apply_batch_interceptor(records, ctx, rt) {
        Some(r) => r,
        None => return,
    };

    let lctx = ListenerContext {
        ack: None,
        seek: seek_callback.clone(),
    };
    let result = rt.block_on(listener.on_message_batch(records.clone(), lctx));
    match result {
        Ok(()) => {
            if let Some(interceptor) = &ctx.batch_interceptor {
                rt.block_on(interceptor.success(&records));
            }
            for (tp, offset) in highest_per_partition {
                offset_tracker.record_batch_highest(&tp, offset);
            }
        }
        Err(e) => {
            if let Some(interceptor) = &ctx.batch_interceptor {
                rt.block_on(interceptor.failure(&records, &e));
            }
            if let Some(record) = records.records.first().cloned() {
                handle_listener_error(record, e, consumer, ctx, offset_tracker, rt, remaining_records);
            }
        }
    }
}

fn highest_offsets(records: &ConsumerRecords) -> Vec<(TopicPartition, i64)> {
    let mut highest: HashMap<TopicPartition, i64> = HashMap::new();
    for record in &records.records {
        highest
            .entry(record.partition.clone())
            .and_modify(|o| *o = (*o).max(record.offset))
            .or_insert(record.offset);
    }
    highest.into_iter().collect()
}

fn apply_record_interceptor(
    record: ConsumerRecord,
    ctx: &LoopContext,
    rt: &tokio::runtime::Handle,
) -> Option<ConsumerRecord> {
    match &ctx.record_interceptor {
        Some(interceptor) => rt.block_on(interceptor.intercept(record)),
        None => Some(record),
    }
}

fn apply_batch_interceptor(
    records: ConsumerRecords,
    ctx: &LoopContext,
    rt: &tokio::runtime::Handle,
) -> Option<ConsumerRecords> {
    match &ctx.batch_interceptor {
        Some(interceptor) => rt.block_on(interceptor.intercept(records)),
        None => Some(records),
    }
}

fn handle_listener_error(
    record: ConsumerRecord,
    error: BoxedListenerError,
    consumer: &mut dyn Consumer,
    ctx: &LoopContext,
    offset_tracker: &mut OffsetTracker,
    rt: &tokio::runtime::Handle,
    remaining_records: &mut Vec<RetainedRecord>,
) {
    let partition = record.partition.clone();
    let offset = record.offset;
    let decision = ctx.error_handler.lock().unwrap().handle(&partition, offset, &error);
    match decision {
        Decision::Handled => {
            offset_tracker.record_ack(&partition, offset);
        }
        Decision::SeekAndRetry { partition, offset } => {
            warn!(partition = %partition, offset, "seeking back to retry after listener error");
            drop(consumer.seek(&partition, offset));
        }
        Decision::Retain { partition, offset, delay } => {
            debug!(partition = %partition, offset, delay_ms = delay.as_millis(), "retaining record in-memory for redelivery");
            drop(consumer.pause(std::slice::from_ref(&partition)));
            remaining_records.push(RetainedRecord {
                record,
                ready_at: Instant::now() + delay,
            });
        }
        Decision::DeadLetter { topic } => {
            warn!(partition = %partition, offset, topic, "routing failed record to dead-letter topic");
            if let Some(factory) = &ctx.producer_factory {
                let suffix = factory.suffix_for(&ctx.properties.group_id, &partition.topic, partition.partition);
                let dlt_record = ProducerRecord {
                    topic,
                    partition: None,
                    key: None,
                    value: None,
                    headers: Vec::new(),
                };
                let factory = factory.clone();
                rt.block_on(async move {
                    if let Ok(producer) = factory.create_producer(suffix) {
                        drop(producer.send(dlt_record).await);
                        factory.release(suffix);
                    }
                });
            }
            offset_tracker.record_ack(&partition, offset);
        }
        Decision::Fatal => {
            error!(partition = %partition, offset, "fatal error from error handler; container will stop");
        }
    }
}

fn commit_pending(consumer: &mut dyn Consumer, ctx: &LoopContext, offset_tracker: &mut OffsetTracker) {
    let to_commit = offset_tracker.take_offsets_to_commit();
    if to_commit.is_empty() {
        return;
    }

    if ctx.properties.transactional {
        if let Some(factory) = &ctx.producer_factory {
            if let Some(group_metadata) = consumer.group_metadata() {
                return commit_via_transaction(factory, &group_metadata, &to_commit, offset_tracker);
            }
        }
    }

    let result = if ctx.properties.commit_sync {
        consumer.commit_sync(&to_commit, ctx.properties.sync_commit_timeout)
    } else {
        consumer.commit_async(&to_commit)
    };
    match result {
        Ok(()) => {
            for (tp, offset) in &to_commit {
                offset_tracker.mark_committed(tp, offset.offset);
            }
        }
        Err(e) => warn!(error = %e, "commit failed"),
    }
}

/// Threads the consumer group metadata through `sendOffsetsToTransaction`
/// (§5: "transactional commits must include the consumer group metadata
/// snapshot"). Runs its own single-statement transaction since the
/// listener's own sends (if any) were already flushed outside this helper.
fn commit_via_transaction(
    factory: &Arc<ProducerFactory>,
    group_metadata: &crate::client::traits::ConsumerGroupMetadata,
    to_commit: &[(TopicPartition, OffsetAndMetadata)],
    offset_tracker: &mut OffsetTracker,
) {
    let suffix = to_commit
        .first()
        .map(|(tp, _)| factory.suffix_for("", &tp.topic, tp.partition))
        .unwrap_or(0);
    let rt = tokio::runtime::Handle::current();
    let committed = rt.block_on(async {
        let txn = crate::producer_factory::KafkaTransaction::begin(factory, suffix).await.ok()?;
        txn.commit(to_commit, group_metadata).await.ok()
    });
    if committed.is_some() {
        for (tp, offset) in to_commit {
            offset_tracker.mark_committed(tp, offset.offset);
        }
    } else {
        warn!("transactional offset commit failed");
    }
}
