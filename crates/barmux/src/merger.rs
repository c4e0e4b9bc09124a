//! Combines the latest upstream frame with the cached probe segments into the frame that is shown on the bar.

use anyhow::{Context, Result};
use bar_protocol::Segment;
use itertools::Itertools;

use crate::{cache::SegmentCache, config::Position, registry::Registry};

/// The segments one probe contributes to a frame, and where they go.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    pub position: &'a Position,
    pub segments: &'a [Segment],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Upstream,
    /// Placed by an anchor or at the end.
    Placed,
    /// Placed at a numeric index.
    Indexed,
}

/// Place the probe segments into the upstream frame. `placements` must be in registry order.
///
/// Anchored placements go first, then those at the end, then numeric indices in ascending order.
/// Numeric indices refer to the list before hidden segments are dropped, so a probe that currently
/// shows nothing still holds its slot. A numeric placement only shifts right past segments of other
/// numeric placements, never past anchored or trailing ones.
pub fn merge(upstream: &[Segment], placements: &[Placement<'_>]) -> Vec<Segment> {
    let mut frame: Vec<(Origin, &Segment)> = upstream.iter().map(|s| (Origin::Upstream, s)).collect();
    let mut at_end = placements.iter().positions(|p| *p.position == Position::End).collect_vec();

    for (i, placement) in placements.iter().enumerate().filter(|(_, p)| p.position.is_anchored()) {
        let insert_at = match placement.position {
            Position::Before(anchor) => frame.iter().position(|(_, s)| &s.name == anchor),
            Position::After(anchor) => frame.iter().rposition(|(_, s)| &s.name == anchor).map(|i| i + 1),
            _ => None,
        };
        match insert_at {
            Some(index) => splice(&mut frame, index, Origin::Placed, placement.segments),
            None => {
                log::debug!("Anchor of position `{}` is not on the bar, placing at the end", placement.position);
                at_end.push(i);
            }
        }
    }

    // unresolved anchors keep their registry order among the `end` placements
    at_end.sort_unstable();
    for i in at_end {
        let len = frame.len();
        splice(&mut frame, len, Origin::Placed, placements[i].segments);
    }

    let numeric = placements
        .iter()
        .filter_map(|p| match p.position {
            Position::Index(index) => Some((*index, p.segments)),
            _ => None,
        })
        .sorted_by_key(|(index, _)| *index);
    for (index, segments) in numeric {
        let mut insert_at = index.min(frame.len());
        while frame.get(insert_at).map_or(false, |(origin, _)| *origin == Origin::Indexed) {
            insert_at += 1;
        }
        splice(&mut frame, insert_at, Origin::Indexed, segments);
    }

    frame.into_iter().map(|(_, segment)| segment).filter(|s| !s.is_hidden()).cloned().collect()
}

fn splice<'a>(frame: &mut Vec<(Origin, &'a Segment)>, index: usize, origin: Origin, segments: &'a [Segment]) {
    frame.splice(index..index, segments.iter().map(|s| (origin, s)));
}

/// Keeps track of what was last shown, and produces a new frame only when something changed.
#[derive(Debug, Default)]
pub struct Merger {
    upstream: Vec<Segment>,
    upstream_version: u64,
    require_upstream: bool,
    merged_versions: Option<(u64, u64)>,
    last_published: Option<String>,
}

impl Merger {
    /// With `require_upstream`, nothing is produced until the first upstream frame arrives.
    pub fn new(require_upstream: bool) -> Self {
        Merger { require_upstream, ..Default::default() }
    }

    pub fn set_upstream(&mut self, frame: Vec<Segment>) {
        self.upstream = frame;
        self.upstream_version += 1;
    }

    /// The serialized frame to publish, or `None` if it would be identical to the last one.
    pub fn next_frame(&mut self, registry: &Registry, cache: &SegmentCache) -> Result<Option<String>> {
        if self.require_upstream && self.upstream_version == 0 {
            return Ok(None);
        }
        let versions = (self.upstream_version, cache.version());
        if self.merged_versions == Some(versions) {
            return Ok(None);
        }

        let snapshot = cache.snapshot();
        let placements = snapshot
            .probes
            .iter()
            .filter_map(|(id, segments)| {
                let probe = registry.lookup(id.as_str())?;
                Some(Placement { position: &probe.descriptor.position, segments })
            })
            .collect_vec();
        let frame = merge(&self.upstream, &placements);
        let serialized = serde_json::to_string(&frame).context("Failed to serialize frame")?;

        self.merged_versions = Some((self.upstream_version, snapshot.version));
        if self.last_published.as_ref() == Some(&serialized) {
            return Ok(None);
        }
        self.last_published = Some(serialized.clone());
        Ok(Some(serialized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bar_protocol::ProbeId;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::time::Instant;

    use crate::{
        cache::Deadline,
        config::ExecMode,
        probe::testing::FnProbe,
        registry::{ProbeDescriptor, RegisteredProbe},
    };

    fn seg(name: &str, text: &str) -> Segment {
        Segment::text(text).with_name(name)
    }

    fn names(frame: &[Segment]) -> Vec<&str> {
        frame.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_empty_segments_keep_their_slot() {
        let (a, b, c) = ([seg("A", "")], [seg("B", "b")], [seg("C", "c")]);
        let placements = [
            Placement { position: &Position::Index(0), segments: &a },
            Placement { position: &Position::Index(1), segments: &b },
            Placement { position: &Position::Index(2), segments: &c },
        ];
        let frame = merge(&[], &placements);
        assert_eq!(serde_json::to_value(&frame).unwrap(), json!([{"full_text":"b","name":"B"},{"full_text":"c","name":"C"}]));
    }

    #[test]
    fn test_after_anchor() {
        let upstream = [seg("u1", "U1"), seg("u2", "U2")];
        let p = [seg("P", "P")];
        let frame = merge(&upstream, &[Placement { position: &Position::After("u1".to_string()), segments: &p }]);
        assert_eq!(names(&frame), vec!["u1", "P", "u2"]);
    }

    #[test]
    fn test_before_anchor_uses_first_match() {
        let upstream = [seg("disk", "/"), seg("disk", "/home"), seg("load", "0.1")];
        let p = [seg("P", "P")];
        let frame = merge(&upstream, &[Placement { position: &Position::Before("disk".to_string()), segments: &p }]);
        assert_eq!(names(&frame), vec!["P", "disk", "disk", "load"]);

        let frame = merge(&upstream, &[Placement { position: &Position::After("disk".to_string()), segments: &p }]);
        assert_eq!(names(&frame), vec!["disk", "disk", "P", "load"]);
    }

    #[test]
    fn test_missing_anchor_falls_back_to_end() {
        let upstream = [seg("u1", "U1")];
        let (p, q) = ([seg("P", "P")], [seg("Q", "Q")]);
        let placements = [
            Placement { position: &Position::After("nothing".to_string()), segments: &p },
            Placement { position: &Position::End, segments: &q },
        ];
        assert_eq!(names(&merge(&upstream, &placements)), vec!["u1", "P", "Q"]);
    }

    #[test]
    fn test_equal_indices_keep_registry_order() {
        let upstream = [seg("u1", "U1"), seg("u2", "U2")];
        let (a, b, c) = ([seg("A", "a")], [seg("B", "b"), seg("B", "b2")], [seg("C", "c")]);
        let placements = [
            Placement { position: &Position::Index(1), segments: &a },
            Placement { position: &Position::Index(1), segments: &b },
            Placement { position: &Position::Index(0), segments: &c },
        ];
        assert_eq!(names(&merge(&upstream, &placements)), vec!["C", "A", "B", "B", "u1", "u2"]);
    }

    #[test]
    fn test_index_is_not_shifted_by_anchored_segments() {
        let upstream = [seg("u1", "U1"), seg("u2", "U2")];
        let (a, p, q) = ([seg("A", "a")], [seg("P", "P")], [seg("Q", "Q")]);
        let placements = [
            Placement { position: &Position::Index(1), segments: &a },
            Placement { position: &Position::After("u1".to_string()), segments: &p },
            Placement { position: &Position::Index(3), segments: &q },
        ];
        let frame = merge(&upstream, &placements);
        assert_eq!(names(&frame), vec!["u1", "A", "P", "Q", "u2"]);
        assert_eq!(frame.iter().position(|s| s.name == "A"), Some(1));
        assert_eq!(frame.iter().position(|s| s.name == "Q"), Some(3));
    }

    #[test]
    fn test_index_past_the_end() {
        let upstream = [seg("u1", "U1")];
        let a = [seg("A", "a")];
        assert_eq!(names(&merge(&upstream, &[Placement { position: &Position::Index(10), segments: &a }])), vec!["u1", "A"]);
    }

    #[test]
    fn test_upstream_passes_through_unchanged() {
        let upstream: Vec<Segment> =
            serde_json::from_value(json!([{"full_text":"x","name":"u","background":"#111111","separator":false}])).unwrap();
        assert_eq!(merge(&upstream, &[]), upstream);
    }

    fn registry() -> Registry {
        let probe = || -> std::sync::Arc<dyn crate::probe::Probe> {
            std::sync::Arc::new(FnProbe::new(|| Ok(crate::probe::ProbeOutput::text("x"))))
        };
        Registry::new(vec![
            RegisteredProbe::new(ProbeDescriptor::new("a", ExecMode::Inline, std::time::Duration::ZERO), probe()),
            RegisteredProbe::new(
                ProbeDescriptor::new("b", ExecMode::Inline, std::time::Duration::ZERO).at(Position::Index(0)),
                probe(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_merger_only_publishes_changes() {
        let registry = registry();
        let cache = SegmentCache::new(registry.ids().cloned());
        let mut merger = Merger::new(true);
        let now = Instant::now();

        cache.replace_probe(&ProbeId::from("a"), vec![seg("a", "A")], Deadline::OnDemand, now);
        assert_eq!(merger.next_frame(&registry, &cache).unwrap(), None, "waits for upstream");

        merger.set_upstream(vec![seg("u", "U")]);
        assert_eq!(
            merger.next_frame(&registry, &cache).unwrap().as_deref(),
            Some(r#"[{"full_text":"U","name":"u"},{"full_text":"A","name":"a"}]"#)
        );
        assert_eq!(merger.next_frame(&registry, &cache).unwrap(), None);

        // same content under a new version
        cache.replace_probe(&ProbeId::from("a"), vec![seg("a", "A")], Deadline::OnDemand, now);
        merger.set_upstream(vec![seg("u", "U")]);
        assert_eq!(merger.next_frame(&registry, &cache).unwrap(), None);

        cache.replace_probe(&ProbeId::from("b"), vec![seg("b", "B")], Deadline::OnDemand, now);
        assert_eq!(
            merger.next_frame(&registry, &cache).unwrap().as_deref(),
            Some(r#"[{"full_text":"B","name":"b"},{"full_text":"U","name":"u"},{"full_text":"A","name":"a"}]"#)
        );
    }

    #[test]
    fn test_standalone_merger_does_not_wait() {
        let registry = registry();
        let cache = SegmentCache::new(registry.ids().cloned());
        let mut merger = Merger::new(false);
        assert_eq!(merger.next_frame(&registry, &cache).unwrap().as_deref(), Some("[]"));
    }
}
