//! Append-only audit trail of a document run.
//!
//! The driver owns one [`AuditSink`] and reports to it in order: one
//! [`AuditSink::begin`], one [`AuditSink::record`] per sentence, and one
//! [`AuditSink::finish`]. Sinks never feed anything back into the pipeline.

use std::io::{self, Write};

use chrono::{DateTime, Local};
use serde_json::json;
use uuid::Uuid;

use crate::driver::SentenceReport;

/// Timestamp layout used in change-log headers and file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Emitted once before the first sentence.
#[derive(Debug, Clone)]
pub struct RunStart {
    /// Identifier of this run.
    pub run_id: Uuid,
    /// Wall-clock start.
    pub started_at: DateTime<Local>,
    /// Characters in the input document.
    pub total_chars: usize,
}

/// Cumulative progress after a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Sentences processed so far.
    pub sentence: usize,
    /// Characters consumed so far.
    pub consumed_chars: usize,
    /// Characters in the input document.
    pub total_chars: usize,
}

impl Progress {
    /// Percentage of characters consumed, `100.0` for an empty document.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.total_chars == 0 {
            return 100.0;
        }
        self.consumed_chars as f64 / self.total_chars as f64 * 100.0
    }
}

/// Emitted once after the last sentence.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Identifier of this run.
    pub run_id: Uuid,
    /// Sentences processed.
    pub sentences: usize,
    /// Sentences whose output differs from the source.
    pub changed: usize,
    /// Characters consumed.
    pub consumed_chars: usize,
    /// Wall-clock end.
    pub completed_at: DateTime<Local>,
}

/// Receives the per-sentence audit trail of a run.
///
/// I/O failures abort the run.
pub trait AuditSink {
    /// Called before the first sentence.
    fn begin(&mut self, run: &RunStart) -> io::Result<()>;

    /// Called after each sentence, in document order.
    fn record(&mut self, sentence: &SentenceReport, progress: &Progress) -> io::Result<()>;

    /// Called after the last sentence.
    fn finish(&mut self, summary: &RunSummary) -> io::Result<()>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AuditSink for NullSink {
    fn begin(&mut self, _run: &RunStart) -> io::Result<()> {
        Ok(())
    }

    fn record(&mut self, _sentence: &SentenceReport, _progress: &Progress) -> io::Result<()> {
        Ok(())
    }

    fn finish(&mut self, _summary: &RunSummary) -> io::Result<()> {
        Ok(())
    }
}

/// Human-readable change log.
///
/// ```text
/// Grammar Correction Log
/// ====================
///
/// Started at: 20241003_141502
///
///
/// Sentence 1:
/// ----------------------------------------
/// CHANGED:
/// Original : The cat sit on mat.
/// Corrected: The cat sits on the mat.
/// Explanation: subject-verb agreement
/// ```
#[derive(Debug)]
pub struct ChangeLog<W: Write> {
    out: W,
}

impl<W: Write> ChangeLog<W> {
    /// Wraps a writer. Nothing is written until [`AuditSink::begin`].
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> AuditSink for ChangeLog<W> {
    fn begin(&mut self, run: &RunStart) -> io::Result<()> {
        writeln!(self.out, "Grammar Correction Log")?;
        writeln!(self.out, "====================\n")?;
        writeln!(
            self.out,
            "Started at: {}\n",
            run.started_at.format(TIMESTAMP_FORMAT)
        )?;
        self.out.flush()
    }

    fn record(&mut self, sentence: &SentenceReport, _progress: &Progress) -> io::Result<()> {
        let entry = &sentence.entry;

        writeln!(self.out, "\nSentence {}:", sentence.index)?;
        writeln!(self.out, "{}", "-".repeat(40))?;
        if entry.has_changes {
            writeln!(self.out, "CHANGED:")?;
            writeln!(self.out, "Original : {}", entry.original)?;
            writeln!(self.out, "Corrected: {}", entry.final_text)?;
            if !entry.explanation.is_empty() {
                writeln!(self.out, "Explanation: {}", entry.explanation)?;
            }
        } else {
            writeln!(self.out, "NO CHANGES NEEDED:")?;
            writeln!(self.out, "{}", entry.original)?;
        }
        if !entry.qa_concerns.is_empty() {
            writeln!(self.out, "QA Notes: {}", entry.qa_concerns.join(", "))?;
        }
        writeln!(self.out)?;
        self.out.flush()
    }

    fn finish(&mut self, summary: &RunSummary) -> io::Result<()> {
        writeln!(self.out, "\nSummary")?;
        writeln!(self.out, "=======")?;
        writeln!(self.out, "Total sentences processed: {}", summary.sentences)?;
        writeln!(self.out, "Sentences changed: {}", summary.changed)?;
        writeln!(
            self.out,
            "Total characters processed: {}",
            summary.consumed_chars
        )?;
        writeln!(
            self.out,
            "Completed at: {}",
            summary.completed_at.format(TIMESTAMP_FORMAT)
        )?;
        self.out.flush()
    }
}

/// Fans every event out to several sinks, in order.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn AuditSink + Send + Sync>>,
}

impl MultiSink {
    /// Creates an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink.
    #[must_use]
    pub fn with(mut self, sink: Box<dyn AuditSink + Send + Sync>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of attached sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sink is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AuditSink for MultiSink {
    fn begin(&mut self, run: &RunStart) -> io::Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.begin(run))
    }

    fn record(&mut self, sentence: &SentenceReport, progress: &Progress) -> io::Result<()> {
        self.sinks
            .iter_mut()
            .try_for_each(|s| s.record(sentence, progress))
    }

    fn finish(&mut self, summary: &RunSummary) -> io::Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.finish(summary))
    }
}

/// Machine-readable trail: one JSON object per line, flushed per event.
///
/// Lines carry an `event` field of `begin`, `sentence` or `finish`. A run
/// that aborts midway still leaves every finished sentence on disk.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    /// Wraps a writer.
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: &serde_json::Value) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, line)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write> AuditSink for JsonLinesSink<W> {
    fn begin(&mut self, run: &RunStart) -> io::Result<()> {
        self.emit(&json!({
            "event": "begin",
            "run_id": run.run_id,
            "started_at": run.started_at.to_rfc3339(),
            "total_chars": run.total_chars,
        }))
    }

    fn record(&mut self, sentence: &SentenceReport, progress: &Progress) -> io::Result<()> {
        self.emit(&json!({
            "event": "sentence",
            "consumed_chars": progress.consumed_chars,
            "total_chars": progress.total_chars,
            "report": sentence,
        }))
    }

    fn finish(&mut self, summary: &RunSummary) -> io::Result<()> {
        self.emit(&json!({
            "event": "finish",
            "run_id": summary.run_id,
            "sentences": summary.sentences,
            "changed": summary.changed,
            "consumed_chars": summary.consumed_chars,
            "completed_at": summary.completed_at.to_rfc3339(),
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::types::{CorrectionProposal, QaVerdict, ResultEntry};

    fn report(index: usize, entry: ResultEntry) -> SentenceReport {
        SentenceReport {
            index,
            span: 0..entry.original.len(),
            leading_whitespace: String::new(),
            trailing_whitespace: String::new(),
            boundary_verified: true,
            entry,
        }
    }

    fn changed_entry() -> ResultEntry {
        ResultEntry::accepted(
            "The cat sit on mat.",
            CorrectionProposal {
                corrected_sentence: "The cat sits on the mat.".to_string(),
                confidence: 0.9,
                explanation: "subject-verb agreement".to_string(),
            },
            QaVerdict {
                is_valid: true,
                maintains_meaning: true,
                technical_accuracy: true,
                concerns: vec![],
            },
            vec![],
        )
    }

    fn progress() -> Progress {
        Progress {
            sentence: 1,
            consumed_chars: 19,
            total_chars: 19,
        }
    }

    #[test]
    fn test_progress_percent() {
        let p = Progress {
            sentence: 1,
            consumed_chars: 25,
            total_chars: 200,
        };
        assert!((p.percent() - 12.5).abs() < f64::EPSILON);

        let empty = Progress {
            sentence: 0,
            consumed_chars: 0,
            total_chars: 0,
        };
        assert!((empty.percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_change_log_layout() {
        let mut log = ChangeLog::new(Vec::new());
        let now = Local::now();
        log.begin(&RunStart {
            run_id: Uuid::new_v4(),
            started_at: now,
            total_chars: 40,
        })
        .unwrap();
        log.record(&report(1, changed_entry()), &progress()).unwrap();
        log.record(
            &report(2, ResultEntry::unchanged("Fine as is.", vec![])),
            &progress(),
        )
        .unwrap();
        log.finish(&RunSummary {
            run_id: Uuid::new_v4(),
            sentences: 2,
            changed: 1,
            consumed_chars: 40,
            completed_at: now,
        })
        .unwrap();

        let text = String::from_utf8(log.into_inner()).unwrap();
        assert!(text.starts_with("Grammar Correction Log\n====================\n\nStarted at: "));
        assert!(text.contains("\nSentence 1:\n----------------------------------------\nCHANGED:\n"));
        assert!(text.contains("Original : The cat sit on mat.\n"));
        assert!(text.contains("Corrected: The cat sits on the mat.\n"));
        assert!(text.contains("Explanation: subject-verb agreement\n"));
        assert!(text.contains("NO CHANGES NEEDED:\nFine as is.\nQA Notes: Failed to find valid correction\n"));
        assert!(text.contains("Total sentences processed: 2\n"));
        assert!(text.contains("Total characters processed: 40\n"));
        assert!(text.contains(&format!("Completed at: {}", now.format(TIMESTAMP_FORMAT))));
    }

    struct Counting(Arc<Mutex<Vec<&'static str>>>);

    impl AuditSink for Counting {
        fn begin(&mut self, _run: &RunStart) -> io::Result<()> {
            self.0.lock().unwrap().push("begin");
            Ok(())
        }

        fn record(&mut self, _s: &SentenceReport, _p: &Progress) -> io::Result<()> {
            self.0.lock().unwrap().push("record");
            Ok(())
        }

        fn finish(&mut self, _summary: &RunSummary) -> io::Result<()> {
            self.0.lock().unwrap().push("finish");
            Ok(())
        }
    }

    #[test]
    fn test_multi_sink_fans_out() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut sink = MultiSink::new()
            .with(Box::new(Counting(events.clone())))
            .with(Box::new(NullSink))
            .with(Box::new(Counting(events.clone())));
        assert_eq!(sink.len(), 3);

        sink.record(&report(1, changed_entry()), &progress()).unwrap();
        assert_eq!(*events.lock().unwrap(), vec!["record", "record"]);
    }

    #[test]
    fn test_json_lines_sink_writes_one_event_per_line() {
        let run_id = Uuid::new_v4();
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.begin(&RunStart {
            run_id,
            started_at: Local::now(),
            total_chars: 19,
        })
        .unwrap();
        sink.record(&report(1, changed_entry()), &progress()).unwrap();
        sink.finish(&RunSummary {
            run_id,
            sentences: 1,
            changed: 1,
            consumed_chars: 19,
            completed_at: Local::now(),
        })
        .unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["event"], "begin");
        assert_eq!(lines[0]["run_id"], run_id.to_string());
        assert_eq!(lines[1]["event"], "sentence");
        assert_eq!(lines[1]["report"]["index"], 1);
        assert_eq!(lines[1]["report"]["entry"]["final"], "The cat sits on the mat.");
        assert_eq!(lines[2]["event"], "finish");
        assert_eq!(lines[2]["changed"], 1);
    }
}
