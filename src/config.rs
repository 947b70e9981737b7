use anyhow::{Context, bail};

use crate::SwitchId;
use crate::topology::Topology;

/// One static link from the topology description file.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSpec {
    pub a: SwitchId,
    pub b: SwitchId,
    pub bandwidth: u64,
    pub delay: u64,
}

/// Parsed startup topology: switch count first, then the edge list.
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyConfig {
    pub switch_count: u32,
    pub links: Vec<LinkSpec>,
}

impl TopologyConfig {
    /// Reads a topology description: a line holding the switch count,
    /// then one `id1 id2 bandwidth delay` line per link. Any malformed
    /// line is a fatal startup error.
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read topology config {}", path))?;
        Self::parse(&content).with_context(|| format!("invalid topology config {}", path))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut switch_count: Option<u32> = None;
        let mut links = Vec::new();

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<u64> = line
                .split_whitespace()
                .map(|field| {
                    field
                        .parse::<u64>()
                        .with_context(|| format!("line {}: bad field {:?}", lineno + 1, field))
                })
                .collect::<anyhow::Result<_>>()?;

            match fields.as_slice() {
                [count] => {
                    if switch_count.is_some() {
                        bail!("line {}: duplicate switch count", lineno + 1);
                    }
                    if !links.is_empty() {
                        bail!("line {}: switch count must precede links", lineno + 1);
                    }
                    let count = u32::try_from(*count)
                        .with_context(|| format!("line {}: switch count too large", lineno + 1))?;
                    if count == 0 {
                        bail!("line {}: switch count must be at least 1", lineno + 1);
                    }
                    switch_count = Some(count);
                }
                [a, b, bandwidth, delay] => {
                    if switch_count.is_none() {
                        bail!("line {}: link listed before switch count", lineno + 1);
                    }
                    links.push(LinkSpec {
                        a: u32::try_from(*a)
                            .with_context(|| format!("line {}: bad switch id", lineno + 1))?,
                        b: u32::try_from(*b)
                            .with_context(|| format!("line {}: bad switch id", lineno + 1))?,
                        bandwidth: *bandwidth,
                        delay: *delay,
                    });
                }
                _ => bail!(
                    "line {}: expected a switch count or 'id1 id2 bandwidth delay'",
                    lineno + 1
                ),
            }
        }

        let switch_count = switch_count.context("config contains no switch count")?;
        Ok(Self {
            switch_count,
            links,
        })
    }

    /// Materializes the static link graph. Range and self-loop checks
    /// live in the topology itself; failures here abort startup.
    pub fn build_topology(&self) -> anyhow::Result<Topology> {
        let mut topology = Topology::new(self.switch_count);
        for link in &self.links {
            topology
                .set_link(link.a, link.b, link.bandwidth, link.delay)
                .with_context(|| format!("bad link {}-{}", link.a, link.b))?;
        }
        Ok(topology)
    }
}
