use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use forge_bot::{FinishReason, RecordSink, SessionRecord};
use forge_core::model::event::Event;
use forge_core::model::tier::Tier;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{Level, event};

use crate::config::{ResolvedOutputs, StatsConfig};

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode statistics JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Raw outcome counts for one tier or the whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounters {
    pub attempts: u64,
    pub success: u64,
    pub keep: u64,
    pub destroy: u64,
    pub unknown: u64,
    pub waiting: u64,
    pub timed_out: u64,
    pub spent: u64,
    pub sells: u64,
    pub earned: u64,
}

impl OutcomeCounters {
    fn is_empty(&self) -> bool {
        *self == OutcomeCounters::default()
    }

    fn add_enhance(&mut self, event: Event, spent: u64, timed_out: bool) {
        self.attempts += 1;
        match event {
            Event::Success => self.success += 1,
            Event::Keep => self.keep += 1,
            Event::Destroy => self.destroy += 1,
            Event::Waiting | Event::Unknown => self.unknown += 1,
        }
        if timed_out {
            self.timed_out += 1;
        }
        self.spent = self.spent.saturating_add(spent);
    }

    fn add_sell(&mut self, earned: u64, timed_out: bool) {
        self.sells += 1;
        if timed_out {
            self.timed_out += 1;
        }
        self.earned = self.earned.saturating_add(earned);
    }

    fn rate(&self, count: u64) -> Option<f64> {
        if self.attempts == 0 {
            None
        } else {
            Some(count as f64 / self.attempts as f64)
        }
    }

    pub fn summary(&self) -> CounterSummary {
        CounterSummary {
            counts: *self,
            net: signed(self.earned).saturating_sub(signed(self.spent)),
            success_rate: self.rate(self.success),
            keep_rate: self.rate(self.keep),
            destroy_rate: self.rate(self.destroy),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CounterSummary {
    #[serde(flatten)]
    pub counts: OutcomeCounters,
    pub net: i64,
    pub success_rate: Option<f64>,
    pub keep_rate: Option<f64>,
    pub destroy_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierSummary {
    /// Tier the attempt or sale started from.
    pub tier: Tier,
    #[serde(flatten)]
    pub stats: CounterSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub run_id: String,
    pub started_at: f64,
    pub updated_at: f64,
    pub records: u64,
    pub confidence: Option<f64>,
    pub initial_gold: Option<u64>,
    pub current_gold: Option<u64>,
    pub current_tier: Option<Tier>,
    pub finish: Option<FinishReason>,
    pub overall: CounterSummary,
    pub per_tier: Vec<TierSummary>,
}

#[derive(Debug)]
pub struct StatsOutputs {
    pub summary: StatsSummary,
    pub events_path: PathBuf,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
}

/// Session statistics: per-tier counters plus a buffered JSONL event log.
///
/// Each record is stamped with `ts` (Unix seconds) and queued; the queue is
/// appended to the event log every `flush_every_n` records, whenever
/// `flush_every_secs` have passed since the last flush, and on finish. The
/// JSON summary is rewritten on every flush.
pub struct RunStatistics {
    run_id: String,
    outputs: ResolvedOutputs,
    flush_every_n: usize,
    flush_interval: Duration,
    pending: Vec<String>,
    last_flush: Instant,
    started_at: f64,
    records: u64,
    confidence: Option<f64>,
    initial_gold: Option<u64>,
    current_gold: Option<u64>,
    current_tier: Option<Tier>,
    finish: Option<FinishReason>,
    overall: OutcomeCounters,
    per_tier: [OutcomeCounters; Tier::COUNT],
}

impl RunStatistics {
    /// Prepare output directories and truncate the event log.
    pub fn create(
        run_id: &str,
        outputs: &ResolvedOutputs,
        config: &StatsConfig,
    ) -> Result<Self, StatsError> {
        for path in [
            &outputs.events_jsonl,
            &outputs.summary_json,
            &outputs.summary_md,
        ] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|source| StatsError::Io {
                    context: "creating statistics output directory",
                    source,
                })?;
            }
        }
        File::create(&outputs.events_jsonl).map_err(|source| StatsError::Io {
            context: "creating event log",
            source,
        })?;

        Ok(Self {
            run_id: run_id.to_string(),
            outputs: outputs.clone(),
            flush_every_n: config.flush_every_n.max(1),
            flush_interval: config.flush_interval(),
            pending: Vec::new(),
            last_flush: Instant::now(),
            started_at: unix_seconds(),
            records: 0,
            confidence: None,
            initial_gold: None,
            current_gold: None,
            current_tier: None,
            finish: None,
            overall: OutcomeCounters::default(),
            per_tier: [OutcomeCounters::default(); Tier::COUNT],
        })
    }

    pub fn overall(&self) -> &OutcomeCounters {
        &self.overall
    }

    pub fn tier(&self, tier: Tier) -> &OutcomeCounters {
        &self.per_tier[tier.index()]
    }

    /// Records queued but not yet written to the event log.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            run_id: self.run_id.clone(),
            started_at: self.started_at,
            updated_at: unix_seconds(),
            records: self.records,
            confidence: self.confidence,
            initial_gold: self.initial_gold,
            current_gold: self.current_gold,
            current_tier: self.current_tier,
            finish: self.finish,
            overall: self.overall.summary(),
            per_tier: self
                .per_tier
                .iter()
                .enumerate()
                .filter(|(_, counters)| !counters.is_empty())
                .filter_map(|(index, counters)| {
                    Tier::from_index(index).map(|tier| TierSummary {
                        tier,
                        stats: counters.summary(),
                    })
                })
                .collect(),
        }
    }

    /// Append queued records to the event log and rewrite the JSON summary.
    pub fn flush(&mut self) -> Result<(), StatsError> {
        if !self.pending.is_empty() {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.outputs.events_jsonl)
                .map_err(|source| StatsError::Io {
                    context: "opening event log for append",
                    source,
                })?;
            let mut chunk = String::new();
            for line in &self.pending {
                chunk.push_str(line);
                chunk.push('\n');
            }
            file.write_all(chunk.as_bytes())
                .map_err(|source| StatsError::Io {
                    context: "writing event log",
                    source,
                })?;
            self.pending.clear();
        }
        self.last_flush = Instant::now();
        self.write_summary_json(&self.summary())
    }

    /// Final flush plus the Markdown highlights.
    pub fn finish(mut self) -> Result<StatsOutputs, StatsError> {
        self.flush()?;
        let summary = self.summary();
        fs::write(&self.outputs.summary_md, render_markdown(&summary))
            .map_err(|source| StatsError::Io {
                context: "writing summary markdown",
                source,
            })?;

        Ok(StatsOutputs {
            summary,
            events_path: self.outputs.events_jsonl.clone(),
            json_path: self.outputs.summary_json.clone(),
            markdown_path: self.outputs.summary_md.clone(),
        })
    }

    fn write_summary_json(&self, summary: &StatsSummary) -> Result<(), StatsError> {
        let bytes = serde_json::to_vec_pretty(summary)?;
        fs::write(&self.outputs.summary_json, bytes).map_err(|source| StatsError::Io {
            context: "writing summary json",
            source,
        })
    }

    fn apply(&mut self, record: &SessionRecord) {
        match record {
            SessionRecord::Init {
                gold,
                tier,
                confidence,
            } => {
                self.initial_gold = Some(*gold);
                self.current_gold = Some(*gold);
                self.current_tier = Some(*tier);
                self.confidence = Some(*confidence);
            }
            SessionRecord::Waiting { before_tier } => {
                self.overall.waiting += 1;
                self.per_tier[before_tier.index()].waiting += 1;
            }
            SessionRecord::Enhance(enhance) => {
                self.overall
                    .add_enhance(enhance.event, enhance.spent, enhance.timed_out);
                self.per_tier[enhance.before_tier.index()].add_enhance(
                    enhance.event,
                    enhance.spent,
                    enhance.timed_out,
                );
                self.current_gold = Some(enhance.gold_after);
                self.current_tier = Some(enhance.after_tier);
            }
            SessionRecord::Sell(sell) => {
                self.overall.add_sell(sell.earned, sell.timed_out);
                self.per_tier[sell.before_tier.index()].add_sell(sell.earned, sell.timed_out);
                self.current_gold = Some(sell.gold_after);
                self.current_tier = Some(Tier::ZERO);
            }
            SessionRecord::Finish { reason, gold, tier } => {
                self.finish = Some(*reason);
                self.current_gold = Some(*gold);
                self.current_tier = Some(*tier);
            }
        }
    }

    fn should_flush(&self, record: &SessionRecord) -> bool {
        matches!(record, SessionRecord::Finish { .. })
            || self.pending.len() >= self.flush_every_n
            || self.last_flush.elapsed() >= self.flush_interval
    }
}

impl RecordSink for RunStatistics {
    fn record(&mut self, record: &SessionRecord) {
        self.records += 1;
        self.apply(record);

        match stamped_line(record) {
            Ok(line) => self.pending.push(line),
            Err(err) => event!(
                target: "forge_runner::stats",
                Level::WARN,
                error = %err,
                kind = record.kind(),
                "failed to encode record"
            ),
        }

        if self.should_flush(record)
            && let Err(err) = self.flush()
        {
            event!(
                target: "forge_runner::stats",
                Level::WARN,
                error = %err,
                pending = self.pending.len(),
                "statistics flush failed; will retry"
            );
        }
    }
}

fn stamped_line(record: &SessionRecord) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(record)?;
    if let Value::Object(map) = &mut value {
        map.insert("ts".to_string(), Value::from(unix_seconds()));
    }
    serde_json::to_string(&value)
}

fn signed(amount: u64) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}

fn unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

fn render_markdown(summary: &StatsSummary) -> String {
    let mut output = String::new();
    output.push_str("# Enhance Session Summary\n\n");
    output.push_str(&format!("- Run: `{}`\n", summary.run_id));
    if let Some(reason) = summary.finish {
        output.push_str(&format!("- Finished: {reason}\n"));
    }
    if let Some(confidence) = summary.confidence {
        output.push_str(&format!("- Confidence: {confidence:.2}\n"));
    }
    if let (Some(start), Some(end)) = (summary.initial_gold, summary.current_gold) {
        output.push_str(&format!("- Gold: {start} -> {end}\n"));
    }
    if let Some(tier) = summary.current_tier {
        output.push_str(&format!("- Final tier: {tier}\n"));
    }
    output.push('\n');

    let overall = &summary.overall;
    output.push_str("## Highlights\n");
    output.push_str(&format!("- Attempts: {}\n", overall.counts.attempts));
    if let Some(rate) = overall.success_rate {
        output.push_str(&format!("- Success rate: {:.1}%\n", rate * 100.0));
    }
    if let Some(rate) = overall.destroy_rate {
        output.push_str(&format!("- Destroy rate: {:.1}%\n", rate * 100.0));
    }
    output.push_str(&format!(
        "- Sells: {} (earned {}G)\n",
        overall.counts.sells, overall.counts.earned
    ));
    output.push_str(&format!("- Spent: {}G\n", overall.counts.spent));
    output.push_str(&format!("- Net: {}G\n", overall.net));
    if overall.counts.timed_out > 0 || overall.counts.unknown > 0 {
        output.push_str(&format!(
            "- Unresolved: {} timed out, {} unknown, {} waiting notices\n",
            overall.counts.timed_out, overall.counts.unknown, overall.counts.waiting
        ));
    }
    output.push('\n');

    output.push_str("## Per Tier\n");
    if summary.per_tier.is_empty() {
        output.push_str("- <none>\n");
        return output;
    }
    output.push_str("| Tier | Attempts | Success | Keep | Destroy | Spent | Sells | Earned |\n");
    output.push_str("|------|----------|---------|------|---------|-------|-------|--------|\n");
    for row in &summary.per_tier {
        let counts = &row.stats.counts;
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} |\n",
            row.tier,
            counts.attempts,
            counts.success,
            counts.keep,
            counts.destroy,
            counts.spent,
            counts.sells,
            counts.earned
        ));
    }
    output
}

/// Read an event log back into its records' JSON values, skipping blank lines.
pub fn read_event_log(path: &Path) -> Result<Vec<Value>, StatsError> {
    let contents = fs::read_to_string(path).map_err(|source| StatsError::Io {
        context: "reading event log",
        source,
    })?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(StatsError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_bot::{EnhanceRecord, SellRecord};

    fn tier(value: u8) -> Tier {
        Tier::new(value).unwrap()
    }

    fn outputs(dir: &Path) -> ResolvedOutputs {
        ResolvedOutputs {
            events_jsonl: dir.join("nested/enhance_log.jsonl"),
            summary_json: dir.join("nested/enhance_summary.json"),
            summary_md: dir.join("nested/enhance_summary.md"),
        }
    }

    fn enhance(from: u8, to: u8, event: Event, spent: u64, gold_after: u64) -> SessionRecord {
        SessionRecord::Enhance(EnhanceRecord {
            before_tier: tier(from),
            after_tier: tier(to),
            event,
            spent,
            gold_before: gold_after + spent,
            gold_after,
            target_tier: tier(9),
            spent_parsed: spent,
            timed_out: false,
        })
    }

    fn session() -> Vec<SessionRecord> {
        vec![
            SessionRecord::Init {
                gold: 1_000,
                tier: Tier::ZERO,
                confidence: 0.9,
            },
            enhance(0, 1, Event::Success, 10, 990),
            enhance(1, 1, Event::Keep, 20, 970),
            SessionRecord::Waiting {
                before_tier: tier(1),
            },
            enhance(1, 2, Event::Success, 20, 950),
            SessionRecord::Sell(SellRecord {
                before_tier: tier(2),
                gold_before: 950,
                gold_after: 990,
                earned: 40,
                target_tier: tier(2),
                timed_out: false,
            }),
            SessionRecord::Finish {
                reason: FinishReason::Stopped,
                gold: 990,
                tier: Tier::ZERO,
            },
        ]
    }

    #[test]
    fn counts_outcomes_per_tier() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut stats =
            RunStatistics::create("t", &outputs(dir.path()), &StatsConfig::default()).unwrap();
        for record in session() {
            stats.record(&record);
        }

        let overall = stats.overall();
        assert_eq!(overall.attempts, 3);
        assert_eq!(overall.success, 2);
        assert_eq!(overall.keep, 1);
        assert_eq!(overall.waiting, 1);
        assert_eq!(overall.spent, 50);
        assert_eq!(overall.earned, 40);
        assert_eq!(overall.summary().net, -10);

        assert_eq!(stats.tier(tier(1)).attempts, 2);
        assert_eq!(stats.tier(tier(1)).summary().success_rate, Some(0.5));
        assert_eq!(stats.tier(tier(2)).sells, 1);
        assert_eq!(stats.tier(tier(5)).summary().success_rate, None);
    }

    #[test]
    fn buffers_until_threshold() {
        let dir = tempfile::tempdir().expect("temp dir");
        let outputs = outputs(dir.path());
        let config = StatsConfig {
            flush_every_n: 3,
            flush_every_secs: 3_600,
        };
        let mut stats = RunStatistics::create("t", &outputs, &config).unwrap();
        let records = session();

        stats.record(&records[0]);
        stats.record(&records[1]);
        assert_eq!(stats.pending(), 2);
        assert_eq!(read_event_log(&outputs.events_jsonl).unwrap().len(), 0);

        stats.record(&records[2]);
        assert_eq!(stats.pending(), 0);
        assert_eq!(read_event_log(&outputs.events_jsonl).unwrap().len(), 3);
        assert!(outputs.summary_json.exists());
    }

    #[test]
    fn finish_record_forces_flush_and_finish_writes_markdown() {
        let dir = tempfile::tempdir().expect("temp dir");
        let outputs = outputs(dir.path());
        let config = StatsConfig {
            flush_every_n: 100,
            flush_every_secs: 3_600,
        };
        let mut stats = RunStatistics::create("evening", &outputs, &config).unwrap();
        for record in session() {
            stats.record(&record);
        }
        assert_eq!(stats.pending(), 0);

        let written = stats.finish().expect("finish");
        let events = read_event_log(&written.events_path).unwrap();
        assert_eq!(events.len(), 7);
        assert_eq!(events[0]["type"], "init");
        assert!(events[0]["ts"].as_f64().unwrap() > 0.0);
        assert_eq!(events[6]["reason"], "stopped");

        let json: Value =
            serde_json::from_str(&fs::read_to_string(&written.json_path).unwrap()).unwrap();
        assert_eq!(json["run_id"], "evening");
        assert_eq!(json["overall"]["attempts"], 3);
        assert_eq!(json["per_tier"][1]["tier"], 1);
        assert_eq!(json["finish"], "stopped");

        let markdown = fs::read_to_string(&written.markdown_path).unwrap();
        assert!(markdown.contains("# Enhance Session Summary"));
        assert!(markdown.contains("- Gold: 1000 -> 990"));
        assert!(markdown.contains("| +1 | 2 | 1 | 1 | 0 | 40 | 0 | 0 |"));
        assert_eq!(written.summary.overall.counts.sells, 1);
    }

    #[test]
    fn unresolved_outcomes_are_tallied() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut stats =
            RunStatistics::create("t", &outputs(dir.path()), &StatsConfig::default()).unwrap();
        let mut record = enhance(3, 3, Event::Unknown, 0, 500);
        if let SessionRecord::Enhance(e) = &mut record {
            e.timed_out = true;
        }
        stats.record(&record);
        assert_eq!(stats.overall().unknown, 1);
        assert_eq!(stats.overall().timed_out, 1);
        let markdown = render_markdown(&stats.summary());
        assert!(markdown.contains("1 timed out, 1 unknown"));
    }
}
