//! Session state machine
//!
//! State lives behind a `parking_lot` mutex that is only held between
//! awaits. Store results are applied to the list as deltas when they arrive,
//! so overlapping saves, deletes and loads may finish in any order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{CommentEntry, CommentFocus, Draft, Identity, SelectionOutcome, SessionSnapshot, SessionState};
use crate::annotations::{Annotation, AnnotationDraft, AnnotationList, HighlightColor};
use crate::config::InteractionConfig;
use crate::error::{AnnotatorError, Result, StoreError, ValidationError};
use crate::geometry::normalize_selection;
use crate::overlay::{self, AccentColor, OverlayRenderer, PointerGesture, PointerTracker};
use crate::store::AnnotationStore;
use crate::viewer::RenderingSurface;

/// Drives annotation capture and display for one article
pub struct SessionController {
    article_id: String,
    store: Arc<dyn AnnotationStore>,
    surface: Arc<dyn RenderingSurface>,
    pulse_duration: Duration,
    inner: Mutex<SessionInner>,
}

struct SessionInner {
    state: SessionState,
    list: AnnotationList,
    draft: Option<Draft>,
    /// Bumped whenever the draft is replaced or dropped
    draft_generation: u64,
    identity: Option<Identity>,
    color: HighlightColor,
    message: Option<String>,
    focus: Option<CommentFocus>,
    renderer: OverlayRenderer,
    pointer: PointerTracker,
}

impl SessionInner {
    fn replace_draft(&mut self, draft: Option<Draft>) {
        self.state = if draft.is_some() {
            SessionState::Drafting
        } else {
            SessionState::Idle
        };
        self.draft = draft;
        self.draft_generation += 1;
        self.message = None;
    }

    fn draft_mut(&mut self) -> Result<&mut Draft> {
        self.draft
            .as_mut()
            .ok_or(AnnotatorError::Validation(ValidationError::NoDraft))
    }
}

impl SessionController {
    pub fn new(
        article_id: impl Into<String>,
        store: Arc<dyn AnnotationStore>,
        surface: Arc<dyn RenderingSurface>,
        interaction: &InteractionConfig,
    ) -> Self {
        Self {
            article_id: article_id.into(),
            store,
            surface,
            pulse_duration: interaction.pulse_duration,
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                list: AnnotationList::new(),
                draft: None,
                draft_generation: 0,
                identity: None,
                color: interaction.default_color,
                message: None,
                focus: None,
                renderer: OverlayRenderer::new(),
                pointer: PointerTracker::new(interaction.click_threshold),
            }),
        }
    }

    pub fn article_id(&self) -> &str {
        &self.article_id
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Called by the host whenever sign-in state changes
    pub fn set_identity(&self, identity: Option<Identity>) {
        self.inner.lock().identity = identity;
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.lock().identity.clone()
    }

    /// Highlighter color used for the next save
    pub fn set_color(&self, color: HighlightColor) {
        self.inner.lock().color = color;
    }

    /// Open a draft from the viewer's current selection, replacing any
    /// existing draft
    pub fn select(&self) -> SelectionOutcome {
        let Some(captured) = self.surface.capture_selection() else {
            return SelectionOutcome::Empty;
        };
        if captured.text.trim().is_empty() {
            return SelectionOutcome::Empty;
        }

        let Some(page) = captured.page_number else {
            tracing::debug!("Selection outside any page, ignoring");
            return SelectionOutcome::GeometryUnavailable;
        };
        let container = self.surface.page_container_rect(page);
        let Some(normalized) = normalize_selection(&captured.text, &captured.rects, container.as_ref()) else {
            tracing::debug!(page, "No page container for selection, ignoring");
            return SelectionOutcome::GeometryUnavailable;
        };

        self.inner.lock().replace_draft(Some(Draft {
            page_number: page,
            highlighted_text: normalized.text,
            comment_text: String::new(),
            regions: normalized.regions,
        }));
        SelectionOutcome::Drafted
    }

    /// Open an empty draft on the current page for pasted text
    pub fn open_draft(&self) {
        let page = self.surface.view().page;
        self.inner.lock().replace_draft(Some(Draft {
            page_number: page,
            highlighted_text: String::new(),
            comment_text: String::new(),
            regions: Vec::new(),
        }));
    }

    pub fn set_highlighted_text(&self, text: impl Into<String>) -> Result<()> {
        self.inner.lock().draft_mut()?.highlighted_text = text.into();
        Ok(())
    }

    pub fn set_comment(&self, comment: impl Into<String>) -> Result<()> {
        self.inner.lock().draft_mut()?.comment_text = comment.into();
        Ok(())
    }

    /// Drop the draft without saving
    pub fn cancel(&self) {
        self.inner.lock().replace_draft(None);
    }

    /// Persist the current draft.
    ///
    /// On success the record is prepended to the list and the overlay is
    /// redrawn. On failure the draft stays open with the error as message,
    /// unless it was replaced while the save was in flight.
    pub async fn save(&self) -> Result<Annotation> {
        let (request, generation) = {
            let mut inner = self.inner.lock();
            let request = self.prepare_save(&inner).map_err(|err| {
                inner.message = Some(err.to_string());
                err
            })?;
            inner.state = SessionState::Saving;
            (request, inner.draft_generation)
        };

        let result = self.store.create(request).await;

        let saved = {
            let mut inner = self.inner.lock();
            let current = inner.draft_generation == generation;

            match result {
                Ok(annotation) => {
                    inner.list.prepend(annotation.clone());
                    if current {
                        inner.replace_draft(None);
                    }
                    tracing::info!(id = %annotation.id, page = annotation.page_number, "Saved annotation");
                    Ok(annotation)
                }
                Err(err) => {
                    tracing::warn!(error = %err, article = %self.article_id, "Failed to save annotation");
                    // a newer draft keeps its own message
                    if current {
                        inner.state = SessionState::Drafting;
                        inner.message = Some(err.to_string());
                    }
                    Err(AnnotatorError::from(err))
                }
            }
        };

        if saved.is_ok() {
            self.redraw();
        }
        saved
    }

    fn prepare_save(&self, inner: &SessionInner) -> Result<AnnotationDraft> {
        if inner.state == SessionState::Saving {
            return Err(ValidationError::SaveInProgress.into());
        }
        let draft = inner.draft.as_ref().ok_or(ValidationError::NoDraft)?;
        let identity = inner.identity.as_ref().ok_or(ValidationError::NotAuthenticated)?;

        let text = draft.highlighted_text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptySelection.into());
        }

        Ok(AnnotationDraft {
            article_id: self.article_id.clone(),
            author_id: identity.uid.clone(),
            author_display_name: identity.display_label(),
            page_number: draft.page_number,
            highlighted_text: text.to_string(),
            comment_text: draft.comment_text.clone(),
            highlight_regions: draft.regions.clone(),
            color: inner.color,
        })
    }

    /// Delete an annotation from the store, then from the list.
    ///
    /// A record the store no longer knows is dropped locally as well.
    pub async fn delete(&self, id: &str) -> Result<()> {
        match self.store.delete(id).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(id, "Annotation already gone from store");
            }
            Err(err) => {
                tracing::warn!(id, error = %err, "Failed to delete annotation");
                self.inner.lock().message = Some(err.to_string());
                return Err(err.into());
            }
        }

        {
            let mut inner = self.inner.lock();
            inner.list.remove(id);
            if inner.focus.as_ref().is_some_and(|f| f.annotation_id == id) {
                inner.focus = None;
            }
        }
        tracing::info!(id, "Deleted annotation");

        self.redraw();
        Ok(())
    }

    /// Fetch the article's annotations and merge them into the list.
    ///
    /// Only records known before the fetch can disappear; anything saved
    /// while it was in flight is kept, and anything deleted meanwhile stays
    /// deleted. Returns the list length afterwards.
    pub async fn load(&self) -> Result<usize> {
        let known_before = self.inner.lock().list.ids();

        let fetched = match self.store.list(&self.article_id).await {
            Ok(fetched) => fetched,
            Err(err) => {
                tracing::warn!(error = %err, article = %self.article_id, "Failed to load annotations");
                self.inner.lock().message = Some(err.to_string());
                return Err(err.into());
            }
        };

        let len = {
            let mut inner = self.inner.lock();
            inner.list.merge_fetched(fetched, &known_before);
            inner.list.len()
        };
        tracing::debug!(article = %self.article_id, annotations = len, "Loaded annotations");

        self.redraw();
        Ok(len)
    }

    /// Repaint every rendered page from the cached list. Returns the number
    /// of boxes drawn.
    pub fn redraw(&self) -> usize {
        let pages = self.surface.rendered_pages();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let mut painted = 0;
        for page in pages {
            let Some(container) = self.surface.page_container_rect(page) else {
                inner.renderer.clear_page(page);
                continue;
            };
            let layer = inner.renderer.render(page, container.size(), &inner.list);
            self.surface.paint_overlay(page, &layer.boxes);
            painted += layer.boxes.len();
        }
        painted
    }

    /// Redraw on every page or zoom change until the surface goes away
    pub async fn follow_view_changes(&self) {
        let mut changes = self.surface.subscribe();
        while changes.changed().await.is_ok() {
            let view = *changes.borrow_and_update();
            tracing::debug!(page = view.page, scale = view.scale, "View changed");
            self.redraw();
        }
    }

    /// Pointer pressed at page-container coordinates
    pub fn pointer_down(&self, page: u32, x: f64, y: f64, at: Instant) {
        let mut inner = self.inner.lock();
        let target = inner.renderer.hit_test(page, x, y).map(|b| b.annotation_id.clone());
        inner.pointer.pointer_down(target, at);
    }

    /// Pointer released. A click on a highlight focuses its comment and
    /// returns the annotation id.
    pub fn pointer_up(&self, at: Instant) -> Option<String> {
        let mut inner = self.inner.lock();
        match inner.pointer.pointer_up(at) {
            PointerGesture::Click(id) => {
                inner.focus = Some(CommentFocus {
                    annotation_id: id.clone(),
                    pulse_until: at + self.pulse_duration,
                });
                Some(id)
            }
            PointerGesture::Drag | PointerGesture::Miss => None,
        }
    }

    pub fn focus(&self) -> Option<CommentFocus> {
        self.inner.lock().focus.clone()
    }

    /// Run `f` against the list without copying it
    pub fn with_annotations<R>(&self, f: impl FnOnce(&AnnotationList) -> R) -> R {
        f(&self.inner.lock().list)
    }

    /// Name to show above a comment for the current reader
    pub fn author_label(&self, annotation: &Annotation) -> String {
        let inner = self.inner.lock();
        overlay::author_label(annotation, inner.identity.as_ref().map(|i| i.uid.as_str()))
    }

    /// Accent for the author's name above a comment
    pub fn author_accent(&self, annotation: &Annotation) -> AccentColor {
        overlay::author_accent(&annotation.author_id)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        let current_user = inner.identity.as_ref().map(|i| i.uid.as_str());
        let annotations = inner
            .list
            .sorted_by_created_desc()
            .into_iter()
            .map(|annotation| CommentEntry {
                author_label: overlay::author_label(annotation, current_user),
                accent: overlay::author_accent(&annotation.author_id),
                annotation: annotation.clone(),
            })
            .collect();

        SessionSnapshot {
            state: inner.state,
            draft: inner.draft.clone(),
            message: inner.message.clone(),
            focused_annotation: inner.focus.as_ref().map(|f| f.annotation_id.clone()),
            color: inner.color,
            annotations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use crate::annotations::FractionalRect;
    use crate::geometry::{ClientRect, PageSize};
    use crate::store::MemoryStore;
    use crate::viewer::{CanvasSurface, PluginSurface};

    const ARTICLE: &str = "1706.03762";

    /// Canvas whose page 1 container sits at {100, 50, 600, 800}
    fn canvas() -> Arc<CanvasSurface> {
        let canvas = CanvasSurface::new(vec![PageSize::new(600.0, 800.0); 3]);
        canvas.set_scale(1.0);
        canvas.set_origin(100.0, 50.0);
        Arc::new(canvas)
    }

    fn controller(store: Arc<dyn AnnotationStore>, surface: Arc<dyn RenderingSurface>) -> SessionController {
        SessionController::new(ARTICLE, store, surface, &InteractionConfig::default())
    }

    fn signed_in(controller: &SessionController) {
        controller.set_identity(Some(Identity::new("u1").with_display_name("Ada")));
    }

    fn select_text(canvas: &CanvasSurface, controller: &SessionController, text: &str) {
        canvas.set_selection(text, vec![ClientRect::new(130.0, 90.0, 300.0, 20.0)]);
        assert_eq!(controller.select(), SelectionOutcome::Drafted);
    }

    #[test]
    fn test_selection_opens_normalized_draft() {
        let canvas = canvas();
        let session = controller(Arc::new(MemoryStore::new()), canvas.clone());

        select_text(&canvas, &session, "  Attention Is All You Need ");

        let draft = session.snapshot().draft.unwrap();
        assert_eq!(session.state(), SessionState::Drafting);
        assert_eq!(draft.page_number, 1);
        assert_eq!(draft.highlighted_text, "Attention Is All You Need");
        assert_eq!(draft.regions, vec![FractionalRect::new(5.0, 5.0, 50.0, 2.5)]);
    }

    #[test]
    fn test_blank_or_orphan_selection_is_ignored() {
        let canvas = canvas();
        let session = controller(Arc::new(MemoryStore::new()), canvas.clone());

        assert_eq!(session.select(), SelectionOutcome::Empty);
        canvas.set_selection("   ", vec![ClientRect::new(130.0, 90.0, 300.0, 20.0)]);
        assert_eq!(session.select(), SelectionOutcome::Empty);

        let plugin = Arc::new(PluginSurface::new());
        plugin.set_selection("sidebar text", vec![ClientRect::new(5.0, 5.0, 50.0, 10.0)]);
        let session = controller(Arc::new(MemoryStore::new()), plugin);
        assert_eq!(session.select(), SelectionOutcome::GeometryUnavailable);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_save_without_user_never_calls_store() {
        let canvas = canvas();
        let store = Arc::new(MemoryStore::new());
        let session = controller(store.clone(), canvas.clone());

        select_text(&canvas, &session, "scaled dot-product");
        let err = session.save().await.unwrap_err();

        assert_eq!(err, AnnotatorError::Validation(ValidationError::NotAuthenticated));
        assert_eq!(store.create_calls(), 0);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, SessionState::Drafting);
        assert_eq!(snapshot.draft.unwrap().highlighted_text, "scaled dot-product");
        assert_eq!(snapshot.message.as_deref(), Some("You must be logged in to save annotations"));
    }

    #[tokio::test]
    async fn test_save_prepends_and_redraws() {
        let canvas = canvas();
        let store = Arc::new(MemoryStore::new());
        let session = controller(store.clone(), canvas.clone());
        signed_in(&session);
        session.set_color(HighlightColor::Blue);

        select_text(&canvas, &session, "encoder stack");
        session.set_comment("six identical layers").unwrap();
        let saved = session.save().await.unwrap();

        assert_eq!(saved.author_id, "u1");
        assert_eq!(saved.author_display_name, "Ada");
        assert_eq!(saved.color, HighlightColor::Blue);
        assert_eq!(saved.comment_text, "six identical layers");

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, SessionState::Idle);
        assert!(snapshot.draft.is_none());
        assert_eq!(snapshot.annotations.len(), 1);

        let painted = canvas.highlights();
        assert_eq!(painted.len(), 1);
        assert_eq!(painted[0].annotation_id, saved.id);
        assert_eq!(painted[0].title, "six identical layers");
    }

    #[tokio::test]
    async fn test_failed_create_keeps_draft_and_list() {
        let canvas = canvas();
        let store = Arc::new(MemoryStore::new());
        store.fail_creates(true);
        let session = controller(store.clone(), canvas.clone());
        signed_in(&session);

        select_text(&canvas, &session, "residual connection");
        let err = session.save().await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(store.create_calls(), 1);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, SessionState::Drafting);
        assert!(snapshot.annotations.is_empty());
        assert_eq!(snapshot.message.as_deref(), Some("Network error: simulated store outage"));

        // retry succeeds with the same draft
        store.fail_creates(false);
        session.save().await.unwrap();
        assert_eq!(session.with_annotations(|list| list.len()), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_record() {
        let canvas = canvas();
        let store = Arc::new(MemoryStore::new());
        let session = controller(store.clone(), canvas.clone());
        signed_in(&session);

        select_text(&canvas, &session, "layer normalization");
        let saved = session.save().await.unwrap();

        store.fail_deletes(true);
        assert!(session.delete(&saved.id).await.is_err());
        assert!(session.with_annotations(|list| list.contains(&saved.id)));
        assert_eq!(canvas.highlights().len(), 1);

        store.fail_deletes(false);
        session.delete(&saved.id).await.unwrap();
        assert!(session.with_annotations(|list| list.is_empty()));
        assert!(canvas.highlights().is_empty());
    }

    #[tokio::test]
    async fn test_delete_of_vanished_record_drops_it_locally() {
        let canvas = canvas();
        let session = controller(Arc::new(MemoryStore::new()), canvas.clone());
        let stale = AnnotationDraft {
            article_id: ARTICLE.to_string(),
            author_id: "u2".to_string(),
            author_display_name: String::new(),
            page_number: 1,
            highlighted_text: "softmax".to_string(),
            comment_text: String::new(),
            highlight_regions: vec![],
            color: HighlightColor::Yellow,
        }
        .into_annotation("gone".to_string(), chrono::Utc::now());
        session.inner.lock().list.prepend(stale);

        session.delete("gone").await.unwrap();
        assert!(session.with_annotations(|list| list.is_empty()));
    }

    #[tokio::test]
    async fn test_delete_through_misrouted_api_keeps_record() {
        use crate::config::StoreConfig;
        use crate::store::HttpStore;

        // nothing is routed, so every request gets a bare 404
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, axum::Router::new()).await.unwrap();
        });
        let store = HttpStore::new(&StoreConfig {
            base_url: format!("http://{}/api", addr),
            api_token: None,
        });

        let canvas = canvas();
        let session = controller(Arc::new(store), canvas.clone());
        session.inner.lock().list.prepend(stored("kept", "u2", "Grace"));

        assert!(session.delete("kept").await.is_err());
        assert!(session.with_annotations(|list| list.contains("kept")));
        assert!(session.snapshot().message.is_some());
    }

    #[tokio::test]
    async fn test_click_focuses_comment_and_drag_does_not() {
        let canvas = canvas();
        let session = controller(Arc::new(MemoryStore::new()), canvas.clone());
        signed_in(&session);
        select_text(&canvas, &session, "beam search");
        let saved = session.save().await.unwrap();

        // box spans x 30..330, y 40..60 inside the page container
        let t0 = Instant::now();
        session.pointer_down(1, 50.0, 45.0, t0);
        assert_eq!(session.pointer_up(t0 + Duration::from_millis(300)), None);
        assert!(session.focus().is_none());

        session.pointer_down(1, 50.0, 45.0, t0);
        assert_eq!(session.pointer_up(t0 + Duration::from_millis(50)), Some(saved.id.clone()));
        let focus = session.focus().unwrap();
        assert!(focus.is_pulsing(t0 + Duration::from_secs(1)));
        assert!(!focus.is_pulsing(t0 + Duration::from_secs(3)));

        session.delete(&saved.id).await.unwrap();
        assert!(session.focus().is_none());
    }

    #[tokio::test]
    async fn test_load_merges_and_survives_failure() {
        let canvas = canvas();
        let seeded = AnnotationDraft {
            article_id: ARTICLE.to_string(),
            author_id: "u2".to_string(),
            author_display_name: "Grace".to_string(),
            page_number: 1,
            highlighted_text: "label smoothing".to_string(),
            comment_text: String::new(),
            highlight_regions: vec![FractionalRect::new(10.0, 10.0, 10.0, 1.0)],
            color: HighlightColor::Green,
        }
        .into_annotation("seed".to_string(), chrono::Utc::now());
        let store = Arc::new(MemoryStore::with_records(vec![seeded.clone()]));
        let session = controller(store.clone(), canvas.clone());
        signed_in(&session);

        assert_eq!(session.load().await.unwrap(), 1);
        assert_eq!(session.load().await.unwrap(), 1);
        assert_eq!(canvas.highlights().len(), 1);
        assert_eq!(session.author_label(&seeded), "Grace");

        store.fail_lists(true);
        assert!(session.load().await.is_err());
        assert_eq!(session.with_annotations(|list| list.len()), 1);
    }

    /// Store whose creates wait until the test opens the gate for that text
    struct GatedStore {
        inner: MemoryStore,
        gates: parking_lot::Mutex<HashMap<String, Arc<Semaphore>>>,
    }

    impl GatedStore {
        fn new(texts: &[&str]) -> Self {
            let gates = texts
                .iter()
                .map(|t| (t.to_string(), Arc::new(Semaphore::new(0))))
                .collect();
            Self {
                inner: MemoryStore::new(),
                gates: parking_lot::Mutex::new(gates),
            }
        }

        fn open(&self, text: &str) {
            if let Some(gate) = self.gates.lock().get(text) {
                gate.add_permits(1);
            }
        }
    }

    #[async_trait]
    impl AnnotationStore for GatedStore {
        async fn list(&self, article_id: &str) -> std::result::Result<Vec<Annotation>, StoreError> {
            self.inner.list(article_id).await
        }

        async fn list_for_author(&self, author_id: &str) -> std::result::Result<Vec<Annotation>, StoreError> {
            self.inner.list_for_author(author_id).await
        }

        async fn create(&self, draft: AnnotationDraft) -> std::result::Result<Annotation, StoreError> {
            let gate = self.gates.lock().get(&draft.highlighted_text).cloned();
            if let Some(gate) = gate {
                let _permit = gate.acquire().await.map_err(|e| StoreError::Network(e.to_string()))?;
            }
            self.inner.create(draft).await
        }

        async fn delete(&self, id: &str) -> std::result::Result<(), StoreError> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_out_of_order_saves_apply_as_deltas() {
        let canvas = canvas();
        let store = Arc::new(GatedStore::new(&["first", "second"]));
        let session = Arc::new(controller(store.clone(), canvas.clone()));
        signed_in(&session);

        select_text(&canvas, &session, "first");
        let first = tokio::spawn({
            let session = session.clone();
            async move { session.save().await }
        });
        while session.state() != SessionState::Saving {
            tokio::task::yield_now().await;
        }

        // a new selection while the first save is in flight
        select_text(&canvas, &session, "second");
        let second = tokio::spawn({
            let session = session.clone();
            async move { session.save().await }
        });
        while session.state() != SessionState::Saving {
            tokio::task::yield_now().await;
        }

        store.open("second");
        let second = second.await.unwrap().unwrap();
        assert_eq!(session.state(), SessionState::Idle);

        store.open("first");
        let first = first.await.unwrap().unwrap();

        session.with_annotations(|list| {
            assert_eq!(list.len(), 2);
            assert!(list.contains(&first.id));
            assert!(list.contains(&second.id));
        });
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(canvas.highlights().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_save_does_not_clobber_newer_draft() {
        let canvas = canvas();
        let store = Arc::new(GatedStore::new(&["stale"]));
        let session = Arc::new(controller(store.clone(), canvas.clone()));
        signed_in(&session);

        select_text(&canvas, &session, "stale");
        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.save().await }
        });
        while session.state() != SessionState::Saving {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            session.save().await.unwrap_err(),
            AnnotatorError::Validation(ValidationError::SaveInProgress)
        );

        select_text(&canvas, &session, "fresh");
        store.open("stale");
        pending.await.unwrap().unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, SessionState::Drafting);
        assert_eq!(snapshot.draft.unwrap().highlighted_text, "fresh");
        assert_eq!(snapshot.annotations.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_stale_save_leaves_newer_draft_quiet() {
        let canvas = canvas();
        let store = Arc::new(GatedStore::new(&["stale"]));
        store.inner.fail_creates(true);
        let session = Arc::new(controller(store.clone(), canvas.clone()));
        signed_in(&session);

        select_text(&canvas, &session, "stale");
        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.save().await }
        });
        while session.state() != SessionState::Saving {
            tokio::task::yield_now().await;
        }

        select_text(&canvas, &session, "fresh");
        store.open("stale");
        assert!(pending.await.unwrap().is_err());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, SessionState::Drafting);
        assert_eq!(snapshot.draft.unwrap().highlighted_text, "fresh");
        assert_eq!(snapshot.message, None);
        assert!(snapshot.annotations.is_empty());
    }

    /// Store whose lists read their records, then wait for a permit
    struct GatedListStore {
        inner: MemoryStore,
        gate: Semaphore,
        list_calls: AtomicUsize,
    }

    impl GatedListStore {
        fn new(records: Vec<Annotation>, permits: usize) -> Self {
            Self {
                inner: MemoryStore::with_records(records),
                gate: Semaphore::new(permits),
                list_calls: AtomicUsize::new(0),
            }
        }

        fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnnotationStore for GatedListStore {
        async fn list(&self, article_id: &str) -> std::result::Result<Vec<Annotation>, StoreError> {
            let records = self.inner.list(article_id).await?;
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.gate
                .acquire()
                .await
                .map_err(|e| StoreError::Network(e.to_string()))?
                .forget();
            Ok(records)
        }

        async fn list_for_author(&self, author_id: &str) -> std::result::Result<Vec<Annotation>, StoreError> {
            self.inner.list_for_author(author_id).await
        }

        async fn create(&self, draft: AnnotationDraft) -> std::result::Result<Annotation, StoreError> {
            self.inner.create(draft).await
        }

        async fn delete(&self, id: &str) -> std::result::Result<(), StoreError> {
            self.inner.delete(id).await
        }
    }

    fn stored(id: &str, author: &str, name: &str) -> Annotation {
        AnnotationDraft {
            article_id: ARTICLE.to_string(),
            author_id: author.to_string(),
            author_display_name: name.to_string(),
            page_number: 1,
            highlighted_text: format!("passage {}", id),
            comment_text: String::new(),
            highlight_regions: vec![FractionalRect::new(10.0, 10.0, 10.0, 1.0)],
            color: HighlightColor::Yellow,
        }
        .into_annotation(id.to_string(), chrono::Utc::now())
    }

    #[tokio::test]
    async fn test_delete_during_load_stays_deleted() {
        let canvas = canvas();
        let store = Arc::new(GatedListStore::new(vec![stored("r1", "u2", "Grace")], 1));
        let session = Arc::new(controller(store.clone(), canvas.clone()));
        signed_in(&session);

        assert_eq!(session.load().await.unwrap(), 1);

        // second load has read r1 from the store and is waiting to return
        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.load().await }
        });
        while store.list_calls() < 2 {
            tokio::task::yield_now().await;
        }

        session.delete("r1").await.unwrap();
        store.gate.add_permits(1);
        assert_eq!(pending.await.unwrap().unwrap(), 0);

        assert!(!session.with_annotations(|list| list.contains("r1")));
        assert!(!store.inner.contains("r1"));
        assert!(canvas.highlights().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_carries_author_accent() {
        let canvas = canvas();
        let store = Arc::new(MemoryStore::with_records(vec![
            stored("a1", "u1", "Ada"),
            stored("a2", "u1", "Ada"),
            stored("g1", "u2", "Grace"),
        ]));
        let session = controller(store, canvas.clone());
        signed_in(&session);
        session.load().await.unwrap();

        let accent_of = |snapshot: &SessionSnapshot, id: &str| {
            let entry = snapshot
                .annotations
                .iter()
                .find(|e| e.annotation.id == id)
                .unwrap();
            (entry.accent, entry.author_label.clone())
        };

        let first = session.snapshot();
        let second = session.snapshot();
        let (ada, ada_label) = accent_of(&first, "a1");
        let (grace, grace_label) = accent_of(&first, "g1");

        assert_eq!(ada_label, "You");
        assert_eq!(grace_label, "Grace");
        assert_eq!(accent_of(&first, "a2").0, ada);
        assert_eq!(accent_of(&second, "a1").0, ada);
        assert_eq!(accent_of(&second, "g1").0, grace);
        assert_ne!(ada, grace);
        assert_eq!(ada.name, "orange");
        assert_eq!(grace.name, "teal");

        let g1 = session.with_annotations(|list| list.get("g1").cloned()).unwrap();
        assert_eq!(session.author_accent(&g1), grace);

        let json = serde_json::to_value(&first).unwrap();
        assert!(json["annotations"][0]["accent"]["name"].as_str().is_some());
        assert!(json["annotations"][0]["authorLabel"].as_str().is_some());
        assert!(json["annotations"][0]["highlightedText"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_paste_only_draft() {
        let canvas = canvas();
        let session = controller(Arc::new(MemoryStore::new()), canvas.clone());
        signed_in(&session);

        session.open_draft();
        assert_eq!(
            session.save().await.unwrap_err(),
            AnnotatorError::Validation(ValidationError::EmptySelection)
        );

        session.set_highlighted_text("pasted quote").unwrap();
        let saved = session.save().await.unwrap();
        assert!(saved.highlight_regions.is_empty());
        assert!(canvas.highlights().is_empty());
    }

    #[test]
    fn test_cancel_and_edit_without_draft() {
        let canvas = canvas();
        let session = controller(Arc::new(MemoryStore::new()), canvas.clone());

        assert_eq!(
            session.set_comment("orphan"),
            Err(AnnotatorError::Validation(ValidationError::NoDraft))
        );

        select_text(&canvas, &session, "warmup steps");
        session.cancel();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.snapshot().draft.is_none());
    }

    #[tokio::test]
    async fn test_zoom_change_triggers_redraw() {
        let canvas = canvas();
        let session = Arc::new(controller(Arc::new(MemoryStore::new()), canvas.clone()));
        signed_in(&session);
        select_text(&canvas, &session, "dropout");
        session.save().await.unwrap();

        let follower = tokio::spawn({
            let session = session.clone();
            async move { session.follow_view_changes().await }
        });
        tokio::task::yield_now().await;

        // zoom wipes the canvas; the follower paints it back at the new size
        canvas.set_scale(2.0);
        for _ in 0..100 {
            if !canvas.highlights().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }

        let painted = canvas.highlights();
        assert_eq!(painted.len(), 1);
        assert!((painted[0].rect.left - 60.0).abs() < 1e-9);
        assert!((painted[0].rect.width - 600.0).abs() < 1e-9);
        follower.abort();
    }
}
