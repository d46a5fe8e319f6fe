use crate::data::{per_second, Epoch, Sample};
use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Publisher,
    Subscriber,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Publisher => "P",
            Role::Subscriber => "S",
        }
    }
}

/// A Sample tagged with the client that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientSample {
    pub client_id: String,
    pub sample: Sample,
}

/// All samples from one side of a run, in spawn order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleGroup {
    samples: Vec<ClientSample>,
}

impl SampleGroup {
    pub fn new(samples: Vec<ClientSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[ClientSample] {
        &self.samples
    }

    pub fn has_samples(&self) -> bool {
        !self.samples.is_empty()
    }

    pub fn msg_count(&self) -> u64 {
        self.samples.iter().map(|c| c.sample.msg_count).sum()
    }

    pub fn msg_bytes(&self) -> u64 {
        self.samples.iter().map(|c| c.sample.msg_bytes()).sum()
    }

    pub fn start(&self) -> Option<Instant> {
        self.samples.iter().map(|c| c.sample.start).min()
    }

    pub fn end(&self) -> Option<Instant> {
        self.samples.iter().map(|c| c.sample.end).max()
    }

    /// Wall-clock span from the earliest start to the latest end on this side.
    pub fn duration(&self) -> Duration {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }

    /// Combined messages per second over the overlapping client windows.
    pub fn rate(&self) -> f64 {
        per_second(self.msg_count(), self.duration())
    }

    /// Combined bytes per second over the overlapping client windows.
    pub fn throughput(&self) -> f64 {
        per_second(self.msg_bytes(), self.duration())
    }

    pub fn rate_stats(&self) -> Option<RateStats> {
        if self.samples.is_empty() {
            return None;
        }

        let rates: Vec<f64> = self.samples.iter().map(|c| c.sample.rate()).collect();
        let min = rates.iter().copied().fold(f64::INFINITY, f64::min);
        let max = rates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = statistical::mean(&rates);
        let stddev = statistical::population_standard_deviation(&rates, Some(avg));

        Some(RateStats {
            min,
            avg,
            max,
            stddev,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub stddev: f64,
}

impl fmt::Display for RateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min {} | avg {} | max {} | stddev {} msgs",
            comma_format(self.min),
            comma_format(self.avg),
            comma_format(self.max),
            comma_format(self.stddev),
        )
    }
}

/// Final result of a benchmark run.
///
/// Derived from the frozen publisher and subscriber samples; rendering it any number of times
/// yields the same text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub name: String,
    pub epoch: Epoch,
    pub publishers: SampleGroup,
    pub subscribers: SampleGroup,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        !self.publishers.has_samples() && !self.subscribers.has_samples()
    }

    /// Both sides folded into one group, as used for the Pub/Sub header line.
    pub fn combined(&self) -> SampleGroup {
        SampleGroup::new(
            self.publishers
                .samples()
                .iter()
                .chain(self.subscribers.samples())
                .cloned()
                .collect(),
        )
    }

    /// One row per client, publishers first, each side in spawn order.
    pub fn csv(&self) -> String {
        let mut out = String::from("#Role,ClientID,MsgCount,MsgSize,StartTime,EndTime,MsgsPerSec\n");
        let rows = [
            (Role::Publisher, &self.publishers),
            (Role::Subscriber, &self.subscribers),
        ];
        for (role, group) in rows {
            for client in group.samples() {
                let sample = &client.sample;
                let _ = writeln!(
                    out,
                    "{},{},{},{},{},{},{:.2}",
                    role.label(),
                    csv_field(&client.client_id),
                    sample.msg_count,
                    sample.msg_size,
                    humantime::format_rfc3339_micros(self.epoch.wall_time(sample.start)),
                    humantime::format_rfc3339_micros(self.epoch.wall_time(sample.end)),
                    sample.rate(),
                );
            }
        }
        out
    }

    fn write_group(
        &self,
        f: &mut fmt::Formatter<'_>,
        indent: &str,
        title: &str,
        group: &SampleGroup,
    ) -> fmt::Result {
        writeln!(f, "{indent}{title} stats: {}", GroupLine(group))?;
        if group.samples().len() > 1 {
            for (idx, client) in group.samples().iter().enumerate() {
                writeln!(
                    f,
                    "{indent} [{}] {} msgs/sec ~ {}/sec ({} msgs)",
                    idx + 1,
                    comma_format(client.sample.rate()),
                    human_bytes(client.sample.throughput()),
                    client.sample.msg_count,
                )?;
            }
            if let Some(stats) = group.rate_stats() {
                writeln!(f, "{indent} {stats}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No publisher or subscribers. Nothing to report.");
        }

        let mut indent = "";
        if self.publishers.has_samples() && self.subscribers.has_samples() {
            writeln!(f, "{} Pub/Sub stats: {}", self.name, GroupLine(&self.combined()))?;
            indent = " ";
        }
        if self.publishers.has_samples() {
            self.write_group(f, indent, "Pub", &self.publishers)?;
        }
        if self.subscribers.has_samples() {
            self.write_group(f, indent, "Sub", &self.subscribers)?;
        }
        Ok(())
    }
}

struct GroupLine<'a>(&'a SampleGroup);

impl fmt::Display for GroupLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} msgs/sec ~ {}/sec",
            comma_format(self.0.rate()),
            human_bytes(self.0.throughput())
        )
    }
}

/// Quote a CSV field that would otherwise split or break its row.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Whole-number rendering with thousands separators, e.g. `1,234,567`.
pub fn comma_format(value: f64) -> String {
    let digits = (value.max(0.).round() as u64).to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Binary-unit byte rendering, e.g. `97.66 KB`.
pub fn human_bytes(bytes: f64) -> String {
    const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];
    let mut value = bytes.max(0.);
    let mut unit = 0;
    while value >= 1024. && unit < UNITS.len() - 1 {
        value /= 1024.;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}
