//! Execution Timeline
//!
//! Tracks step start/end times for run summaries and Gantt charts.
//! A single timeline is shared by every thread of a run.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Step started executing
    Started,
    /// Step completed successfully
    Completed,
    /// Step failed
    Failed,
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// Label of the step
    pub step_id: String,
    /// Type of event
    pub event_type: EventType,
    /// When the event occurred
    pub timestamp: Instant,
}

/// One run of a step, in milliseconds since the timeline started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSpan {
    pub step_id: String,
    pub start_ms: u128,
    pub end_ms: u128,
    pub failed: bool,
}

impl StepSpan {
    pub fn duration_ms(&self) -> u128 {
        self.end_ms - self.start_ms
    }
}

/// Tracks the execution timeline of a run.
///
/// Records when each step starts, completes, or fails. Recording takes
/// `&self` so the timeline can be borrowed by parallel workers.
#[derive(Debug)]
pub struct ExecutionTimeline {
    events: Mutex<Vec<TimelineEvent>>,
    start_time: Instant,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            start_time: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TimelineEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records an event for a step.
    pub fn add_event(&self, step_id: impl Into<String>, event_type: EventType) {
        self.lock().push(TimelineEvent {
            step_id: step_id.into(),
            event_type,
            timestamp: Instant::now(),
        });
    }

    /// Number of recorded events of the given type.
    pub fn count(&self, event_type: EventType) -> usize {
        self.lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    /// Pairs start and end events into spans, ordered by start time.
    ///
    /// A label may be running more than once at the same time (the same
    /// agent in two branches of a parallel sequence); each end closes the
    /// earliest open start of its label.
    pub fn spans(&self) -> Vec<StepSpan> {
        let mut open: HashMap<String, VecDeque<u128>> = HashMap::new();
        let mut spans = Vec::new();

        for event in self.lock().iter() {
            let elapsed = event.timestamp.duration_since(self.start_time).as_millis();

            match event.event_type {
                EventType::Started => {
                    open.entry(event.step_id.clone())
                        .or_default()
                        .push_back(elapsed);
                }
                EventType::Completed | EventType::Failed => {
                    let start = open
                        .get_mut(&event.step_id)
                        .and_then(VecDeque::pop_front);
                    if let Some(start_ms) = start {
                        spans.push(StepSpan {
                            step_id: event.step_id.clone(),
                            start_ms,
                            end_ms: elapsed,
                            failed: event.event_type == EventType::Failed,
                        });
                    }
                }
            }
        }

        spans.sort_by_key(|span| span.start_ms);
        spans
    }

    /// Labels of the steps that failed, in start order.
    pub fn failed_steps(&self) -> Vec<String> {
        self.spans()
            .into_iter()
            .filter(|span| span.failed)
            .map(|span| span.step_id)
            .collect()
    }

    /// Generates an ASCII Gantt chart representation.
    ///
    /// Each step run is shown as a bar indicating when it ran
    /// relative to the total execution time.
    pub fn gantt_chart(&self) -> String {
        let mut output = String::from("\nExecution Timeline:\n\n");

        let total_time = self.start_time.elapsed().as_millis();

        if total_time == 0 {
            return output;
        }

        // Scale to 50 characters width
        let scale = 50.0 / total_time as f64;

        for span in self.spans() {
            let start_pos = (span.start_ms as f64 * scale) as usize;
            let width = (span.duration_ms() as f64 * scale).max(1.0) as usize;

            let mut bar = " ".repeat(start_pos);
            bar.push_str(&"#".repeat(width));

            output.push_str(&format!(
                "{:12} |{}| ({} ms){}\n",
                truncate(&span.step_id, 12),
                bar,
                span.duration_ms(),
                if span.failed { " FAILED" } else { "" }
            ));
        }

        output.push_str(&format!("\nTotal: {} ms\n", total_time));
        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncates a string to a maximum length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_timeline_creation() {
        let timeline = ExecutionTimeline::new();
        assert!(timeline.spans().is_empty());
        assert_eq!(timeline.count(EventType::Started), 0);
    }

    #[test]
    fn test_add_events() {
        let timeline = ExecutionTimeline::new();
        timeline.add_event("step1", EventType::Started);
        thread::sleep(Duration::from_millis(10));
        timeline.add_event("step1", EventType::Completed);

        assert_eq!(timeline.count(EventType::Started), 1);
        assert_eq!(timeline.count(EventType::Completed), 1);
    }

    #[test]
    fn test_spans() {
        let timeline = ExecutionTimeline::new();
        timeline.add_event("step1", EventType::Started);
        thread::sleep(Duration::from_millis(50));
        timeline.add_event("step1", EventType::Completed);

        let spans = timeline.spans();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].duration_ms() >= 50);
        assert!(!spans[0].failed);
    }

    #[test]
    fn test_spans_only_started() {
        let timeline = ExecutionTimeline::new();
        timeline.add_event("step1", EventType::Started);

        assert!(timeline.spans().is_empty());
    }

    #[test]
    fn test_overlapping_runs_of_same_step() {
        let timeline = ExecutionTimeline::new();
        timeline.add_event("HR", EventType::Started);
        thread::sleep(Duration::from_millis(30));
        timeline.add_event("HR", EventType::Started);
        thread::sleep(Duration::from_millis(70));
        timeline.add_event("HR", EventType::Completed);
        thread::sleep(Duration::from_millis(30));
        timeline.add_event("HR", EventType::Failed);

        let spans = timeline.spans();
        assert_eq!(spans.len(), 2);
        assert!(spans.iter().all(|s| s.step_id == "HR" && s.duration_ms() >= 100));
        assert!(spans[1].start_ms >= spans[0].start_ms + 30);
        assert_eq!(timeline.failed_steps(), vec!["HR"]);

        let chart = timeline.gantt_chart();
        assert_eq!(chart.matches("HR ").count(), 2);
    }

    #[test]
    fn test_timeline_shared_across_threads() {
        let timeline = Arc::new(ExecutionTimeline::new());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let timeline = Arc::clone(&timeline);
                thread::spawn(move || {
                    timeline.add_event(format!("s{}", i), EventType::Started);
                    timeline.add_event(format!("s{}", i), EventType::Completed);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(timeline.count(EventType::Started), 4);
        assert_eq!(timeline.spans().len(), 4);
    }

    #[test]
    fn test_gantt_chart_generation() {
        let timeline = ExecutionTimeline::new();

        timeline.add_event("step1", EventType::Started);
        thread::sleep(Duration::from_millis(20));
        timeline.add_event("step1", EventType::Completed);
        timeline.add_event("step2", EventType::Started);
        thread::sleep(Duration::from_millis(20));
        timeline.add_event("step2", EventType::Failed);

        let chart = timeline.gantt_chart();
        assert!(chart.contains("step1"));
        assert!(chart.contains("step2"));
        assert!(chart.contains("FAILED"));
        assert!(chart.contains("Total:"));
        assert_eq!(timeline.failed_steps(), vec!["step2"]);
    }

    #[test]
    fn test_gantt_chart_empty() {
        let chart = ExecutionTimeline::new().gantt_chart();
        assert!(chart.contains("Timeline"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 8), "short   ");
        assert_eq!(truncate("a_very_long_step_name", 8), "a_ver...");
    }
}
