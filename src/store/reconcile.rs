use std::collections::HashSet;

use crate::markup::{StrokeId, StrokeRecord};

/// Server strokes in order, followed by local strokes the server has not echoed yet.
pub fn merge_strokes(server: &[StrokeRecord], local: &[StrokeRecord]) -> Vec<StrokeRecord> {
    let server_ids: HashSet<&StrokeId> = server.iter().map(|stroke| &stroke.id).collect();
    server
        .iter()
        .chain(local.iter().filter(|stroke| !server_ids.contains(&stroke.id)))
        .cloned()
        .collect()
}

/// Optimistic view over the persisted strokes of one image.
#[derive(Debug, Default)]
pub struct StrokeStore {
    server: Vec<StrokeRecord>,
    local: Vec<StrokeRecord>,
    confirmed: HashSet<StrokeId>,
    hidden: HashSet<StrokeId>,
    merged: Vec<StrokeRecord>,
}

impl StrokeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strokes(&self) -> &[StrokeRecord] {
        &self.merged
    }

    pub fn get(&self, id: &StrokeId) -> Option<&StrokeRecord> {
        self.merged.iter().find(|stroke| &stroke.id == id)
    }

    pub fn contains(&self, id: &StrokeId) -> bool {
        self.get(id).is_some()
    }

    pub fn position(&self, id: &StrokeId) -> Option<usize> {
        self.merged.iter().position(|stroke| &stroke.id == id)
    }

    pub fn is_confirmed(&self, id: &StrokeId) -> bool {
        self.confirmed.contains(id)
    }

    /// True while this session holds the only copy of the stroke.
    pub fn is_local(&self, id: &StrokeId) -> bool {
        self.local.iter().any(|stroke| &stroke.id == id)
    }

    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    /// Records a stroke created in this session. Ids the server already
    /// confirmed never come back as local copies.
    pub fn add_local(&mut self, stroke: StrokeRecord) -> bool {
        if self.confirmed.contains(&stroke.id) || self.local.iter().any(|s| s.id == stroke.id) {
            return false;
        }
        self.local.push(stroke);
        self.rebuild();
        true
    }

    /// Drops a local copy outright (used when an unsaved stroke is abandoned).
    pub fn remove_local(&mut self, id: &StrokeId) -> Option<StrokeRecord> {
        let index = self.local.iter().position(|stroke| &stroke.id == id)?;
        let removed = self.local.remove(index);
        self.hidden.remove(id);
        self.rebuild();
        Some(removed)
    }

    /// Replaces the server set with a fresh snapshot.
    pub fn replace_server(&mut self, snapshot: Vec<StrokeRecord>) {
        self.confirmed
            .extend(snapshot.iter().map(|stroke| stroke.id.clone()));
        let confirmed = &self.confirmed;
        self.local.retain(|stroke| !confirmed.contains(&stroke.id));
        self.server = snapshot;

        let server = &self.server;
        let local = &self.local;
        self.hidden.retain(|id| {
            server.iter().any(|stroke| &stroke.id == id) || local.iter().any(|s| &s.id == id)
        });
        self.rebuild();
        tracing::debug!(
            server = self.server.len(),
            local = self.local.len(),
            hidden = self.hidden.len(),
            "reconciled stroke snapshot"
        );
    }

    /// Hides a stroke pending deletion; returns false if it is not visible.
    pub fn hide(&mut self, id: &StrokeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.hidden.insert(id.clone());
        self.rebuild();
        true
    }

    /// Reverts `hide` after a failed delete.
    pub fn unhide(&mut self, id: &StrokeId) {
        if self.hidden.remove(id) {
            self.rebuild();
        }
    }

    /// Forgets the local copy of a deleted stroke. It stays hidden until a
    /// snapshot without it arrives.
    pub fn forget(&mut self, id: &StrokeId) {
        self.local.retain(|stroke| &stroke.id != id);
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let hidden = &self.hidden;
        self.merged = merge_strokes(&self.server, &self.local)
            .into_iter()
            .filter(|stroke| !hidden.contains(&stroke.id))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Color, ImagePoint};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn stroke(id: &str) -> StrokeRecord {
        StrokeRecord::from_path(
            StrokeId::from(id),
            Color::new(0, 0, 0),
            6,
            vec![ImagePoint::new(0.0, 0.0), ImagePoint::new(1.0, 1.0)],
            Utc.timestamp_opt(0, 0).single().expect("valid timestamp"),
        )
        .expect("two points make a stroke")
    }

    fn ids(strokes: &[StrokeRecord]) -> Vec<&str> {
        strokes.iter().map(|stroke| stroke.id.as_str()).collect()
    }

    #[test]
    fn merge_appends_unconfirmed_locals_after_server() {
        let merged = merge_strokes(&[stroke("a"), stroke("b")], &[stroke("b"), stroke("c")]);
        assert_eq!(ids(&merged), vec!["a", "b", "c"]);
    }

    #[test]
    fn local_stroke_is_visible_before_server_echo() {
        let mut store = StrokeStore::new();
        assert!(store.add_local(stroke("s1")));
        assert_eq!(ids(store.strokes()), vec!["s1"]);

        store.replace_server(vec![stroke("s1")]);
        assert_eq!(ids(store.strokes()), vec!["s1"]);
        assert_eq!(store.local_len(), 0);
        assert!(store.is_confirmed(&StrokeId::from("s1")));
    }

    #[test]
    fn confirmed_id_never_returns_as_local() {
        let mut store = StrokeStore::new();
        store.replace_server(vec![stroke("s1")]);
        store.replace_server(Vec::new());
        assert!(!store.add_local(stroke("s1")));
        assert!(store.strokes().is_empty());
    }

    #[test]
    fn hidden_stroke_stays_hidden_until_snapshot_drops_it() {
        let mut store = StrokeStore::new();
        store.replace_server(vec![stroke("a"), stroke("b")]);
        assert!(store.hide(&StrokeId::from("a")));
        assert_eq!(ids(store.strokes()), vec!["b"]);

        store.replace_server(vec![stroke("a"), stroke("b")]);
        assert_eq!(ids(store.strokes()), vec!["b"]);

        store.replace_server(vec![stroke("b")]);
        store.replace_server(vec![stroke("a"), stroke("b")]);
        assert_eq!(ids(store.strokes()), vec!["a", "b"]);
    }

    #[test]
    fn unhide_restores_stroke_in_place() {
        let mut store = StrokeStore::new();
        store.replace_server(vec![stroke("a"), stroke("b")]);
        store.hide(&StrokeId::from("a"));
        store.unhide(&StrokeId::from("a"));
        assert_eq!(ids(store.strokes()), vec!["a", "b"]);
    }

    #[test]
    fn hidden_local_stroke_survives_snapshots_without_it() {
        let mut store = StrokeStore::new();
        store.add_local(stroke("pending"));
        store.hide(&StrokeId::from("pending"));
        store.replace_server(Vec::new());
        assert!(store.strokes().is_empty());

        store.forget(&StrokeId::from("pending"));
        assert!(store.strokes().is_empty());
    }

    #[test]
    fn remove_local_discards_unsaved_stroke() {
        let mut store = StrokeStore::new();
        store.add_local(stroke("draft"));
        let removed = store
            .remove_local(&StrokeId::from("draft"))
            .expect("local stroke should be removable");
        assert_eq!(removed.id.as_str(), "draft");
        assert!(store.strokes().is_empty());
        assert!(store.remove_local(&StrokeId::from("draft")).is_none());
    }

    fn id_list() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-e]", 0..6)
    }

    proptest! {
        #[test]
        fn merged_view_has_unique_ids_and_server_prefix(
            server_ids in id_list(),
            local_ids in id_list(),
        ) {
            let mut server_ids = server_ids;
            let mut seen = HashSet::new();
            server_ids.retain(|id| seen.insert(id.clone()));

            let mut store = StrokeStore::new();
            for id in &local_ids {
                store.add_local(stroke(id));
            }
            let snapshot: Vec<_> = server_ids.iter().map(|id| stroke(id)).collect();
            store.replace_server(snapshot.clone());
            let first = store.strokes().to_vec();
            store.replace_server(snapshot);

            prop_assert_eq!(store.strokes(), first.as_slice());
            let unique: HashSet<_> = first.iter().map(|s| s.id.clone()).collect();
            prop_assert_eq!(unique.len(), first.len());
            let prefix: Vec<&str> = ids(&first).into_iter().take(server_ids.len()).collect();
            let expected: Vec<&str> = server_ids.iter().map(String::as_str).collect();
            prop_assert_eq!(prefix, expected);
        }
    }
}
