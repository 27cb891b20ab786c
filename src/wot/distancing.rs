use std::collections::BTreeMap;

use crate::types::{CertLink, KeyRow};

use super::graph::{ExtraLinks, WotGraph};

/// Drop links that have aged past `sig_validity` as of `as_of` (spec §3
/// invariant B4: a link aged exactly `sigValidity` is already obsolete).
/// Called before building a [`WotGraph`] so every reachability query sees
/// only currently valid certifications.
pub fn retain_current_links(links: Vec<CertLink>, as_of: i64, sig_validity: i64) -> Vec<CertLink> {
    links
        .into_iter()
        .filter(|link| !link.is_obsolete(as_of, sig_validity))
        .collect()
}

/// Recompute each member's `kick`/`distanced` state against the current
/// graph (spec §4.6): `distanced` is whichever other members `m` cannot
/// mutually reach within `max_hops` steps, and `kick` is set once `m` is
/// distanced from anyone or has fewer than `sig_qty` current links —
/// the member stays on file until the next block actually applies the
/// kick.
pub fn recompute_kicks(
    graph: &WotGraph,
    max_hops: u32,
    sig_qty: usize,
    extra_links: &ExtraLinks,
) -> BTreeMap<String, KeyRow> {
    let members = graph.members();
    let mut rows = BTreeMap::new();

    for member in members {
        let distanced = graph.members_not_reached_within(member, members, max_hops, extra_links);
        let under_linked = graph.link_count(member, extra_links) < sig_qty;
        let kick = !distanced.is_empty() || under_linked;
        rows.insert(
            member.clone(),
            KeyRow {
                member: true,
                kick,
                distanced: distanced.into_iter().collect(),
            },
        );
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn link(source: &str, target: &str, timestamp: i64) -> CertLink {
        CertLink {
            source: source.to_string(),
            target: target.to_string(),
            timestamp,
        }
    }

    #[test]
    fn link_aged_exactly_sig_validity_is_dropped() {
        let links = vec![link("a", "b", 0)];
        let current = retain_current_links(links, 100, 100);
        assert!(current.is_empty());
    }

    #[test]
    fn link_just_under_sig_validity_survives() {
        let links = vec![link("a", "b", 0)];
        let current = retain_current_links(links, 99, 100);
        assert_eq!(current.len(), 1);
    }

    #[test]
    fn fully_connected_members_have_no_kicks() {
        let members: BTreeSet<String> = ["a", "b", "c"].into_iter().map(String::from).collect();
        let links = vec![
            link("a", "b", 0),
            link("b", "a", 0),
            link("b", "c", 0),
            link("c", "b", 0),
            link("c", "a", 0),
            link("a", "c", 0),
        ];
        let graph = WotGraph::new(members, &links);
        let rows = recompute_kicks(&graph, 3, 2, &ExtraLinks::new());
        assert!(!rows["a"].kick);
        assert!(!rows["b"].kick);
        assert!(!rows["c"].kick);
    }

    #[test]
    fn unreachable_member_is_flagged_distanced_and_kicked() {
        let members: BTreeSet<String> = ["a", "b", "c"].into_iter().map(String::from).collect();
        let links = vec![link("a", "b", 0), link("b", "a", 0)];
        let graph = WotGraph::new(members, &links);
        let rows = recompute_kicks(&graph, 3, 1, &ExtraLinks::new());
        assert!(rows["a"].kick);
        assert!(rows["a"].distanced.contains(&"c".to_string()));
        assert!(rows["c"].kick);
    }

    #[test]
    fn under_linked_member_is_kicked_even_if_reachable() {
        let members: BTreeSet<String> = ["a", "b"].into_iter().map(String::from).collect();
        let links = vec![link("a", "b", 0), link("b", "a", 0)];
        let graph = WotGraph::new(members, &links);
        let rows = recompute_kicks(&graph, 3, 2, &ExtraLinks::new());
        assert!(rows["a"].kick);
        assert!(rows["a"].distanced.is_empty());
    }
}
