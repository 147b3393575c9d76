#![forbid(unsafe_code)]

//! The part service: activation, bring-to-top, hiding, and perspective
//! switching over one [`WorkbenchModel`].
//!
//! Every public operation runs as a transition:
//!
//! ```text
//! begin ──▶ mutate model ──▶ settle ──────────────▶ focus ──▶ notify
//!   │                          │                                │
//!   visible parts (before)     re-point shared elements         listeners,
//!                              reconcile widgets                then the bus
//! ```
//!
//! # Invariants
//!
//! 1. Each top-level window has at most one active part. The application-wide
//!    active part is the active part of the selected window.
//! 2. After settling, a shared element whose current placeholder left the
//!    active layout points at a placeholder still inside it, when one exists.
//! 3. A part holds a contribution exactly while it holds a widget.
//! 4. Notifications go out after the model settles, never mid-mutation.
//!    Listeners receive no handle to the service, so they cannot re-enter it.
//!
//! # Failure Modes
//!
//! - Unknown, non-part, or detached targets fail with
//!   [`WorkbenchError::InvalidArgument`] before anything is mutated.
//! - Listener errors and panics are contained by [`PartListenerList`].
//! - Persist failures become `false` results (see [`crate::save`]).

use std::collections::BTreeSet;
use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use trellis_model::{
    ContainerRole, ContributionHandle, ElementFilter, ElementId, ElementKind, ElementType,
    ModelElement, SearchScope, StepLink, WidgetHandle, WorkbenchModel, contains,
    effectively_visible, find, find_first, in_active_layout, render_path, selected_chain,
};

use crate::activation_history::ActivationHistory;
use crate::bus::{EventBus, NullEventBus, WorkbenchEvent};
use crate::config::WorkbenchConfig;
use crate::descriptor::{DescriptorRegistry, StaticDescriptorRegistry};
use crate::error::{Result, WorkbenchError};
use crate::listener::{ListenerId, PartEvent, PartEventKind, PartListener, PartListenerList};
use crate::logging::targets;
use crate::presentation::{HeadlessPresentation, PartContribution, PresentationEngine};
use crate::save::SaveHandler;

/// Options for [`PartService::activate_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivateOptions {
    /// Run the focus callbacks once the part is active.
    pub requires_focus: bool,
}

impl Default for ActivateOptions {
    fn default() -> Self {
        Self {
            requires_focus: true,
        }
    }
}

/// Activation state of one top-level window.
#[derive(Debug, Clone)]
pub(crate) struct WindowScope {
    pub(crate) active_part: Option<ElementId>,
    pub(crate) history: ActivationHistory,
}

/// A part resolved to the layout node standing for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Target {
    pub(crate) part: ElementId,
    /// The part itself, or the placeholder realizing it.
    pub(crate) local: ElementId,
    pub(crate) window: ElementId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActivationChange {
    window: ElementId,
    old: Option<ElementId>,
    new: Option<ElementId>,
}

/// Effects of one operation, turned into notifications by `finish`.
#[derive(Debug)]
pub(crate) struct Transition {
    before: BTreeSet<ElementId>,
    activation: Option<ActivationChange>,
    pub(crate) hidden: Option<ElementId>,
    pub(crate) topped: Option<ElementId>,
    pub(crate) focus: Option<ElementId>,
}

/// Owner of the workbench model and the engine deciding what is active and
/// rendered.
pub struct PartService {
    pub(crate) model: WorkbenchModel,
    pub(crate) presentation: Box<dyn PresentationEngine>,
    pub(crate) descriptors: Box<dyn DescriptorRegistry>,
    pub(crate) bus: Box<dyn EventBus>,
    pub(crate) save_handler: Option<Box<dyn SaveHandler>>,
    pub(crate) listeners: PartListenerList,
    pub(crate) config: WorkbenchConfig,
    pub(crate) contributions: FxHashMap<ContributionHandle, Box<dyn PartContribution>>,
    scopes: FxHashMap<ElementId, WindowScope>,
    /// Placeholder each rendered shared element is parented under.
    hosts: FxHashMap<ElementId, ElementId>,
    next_contribution: u64,
    clock: u64,
}

impl fmt::Debug for PartService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartService")
            .field("elements", &self.model.len())
            .field("active_part", &self.active_part())
            .field("windows", &self.scopes.len())
            .field("contributions", &self.contributions.len())
            .field("listeners", &self.listeners)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PartService {
    /// Service over `model` with headless collaborators and default config.
    ///
    /// Nothing is rendered until the first operation or
    /// [`PartService::sync_presentation`].
    #[must_use]
    pub fn new(model: WorkbenchModel) -> Self {
        Self {
            model,
            presentation: Box::new(HeadlessPresentation::new()),
            descriptors: Box::new(StaticDescriptorRegistry::new()),
            bus: Box::new(NullEventBus),
            save_handler: None,
            listeners: PartListenerList::new(),
            config: WorkbenchConfig::default(),
            contributions: FxHashMap::default(),
            scopes: FxHashMap::default(),
            hosts: FxHashMap::default(),
            next_contribution: 0,
            clock: 0,
        }
    }

    #[must_use]
    pub fn with_presentation(mut self, presentation: impl PresentationEngine + 'static) -> Self {
        self.presentation = Box::new(presentation);
        self
    }

    #[must_use]
    pub fn with_descriptors(mut self, descriptors: impl DescriptorRegistry + 'static) -> Self {
        self.descriptors = Box::new(descriptors);
        self
    }

    #[must_use]
    pub fn with_event_bus(mut self, bus: impl EventBus + 'static) -> Self {
        self.bus = Box::new(bus);
        self
    }

    #[must_use]
    pub fn with_save_handler(mut self, handler: impl SaveHandler + 'static) -> Self {
        self.save_handler = Some(Box::new(handler));
        self
    }

    /// Replace the configuration. Existing window histories keep their depth.
    #[must_use]
    pub fn with_config(mut self, config: WorkbenchConfig) -> Self {
        self.config = config;
        self
    }

    /// Install or remove the save handler.
    pub fn set_save_handler(&mut self, handler: Option<Box<dyn SaveHandler>>) {
        self.save_handler = handler;
    }

    pub fn add_part_listener(&mut self, listener: Box<dyn PartListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_part_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Listener calls that failed or panicked so far.
    #[must_use]
    pub fn listener_failures(&self) -> u64 {
        self.listeners.failures()
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn model(&self) -> &WorkbenchModel {
        &self.model
    }

    #[must_use]
    pub fn into_model(self) -> WorkbenchModel {
        self.model
    }

    #[must_use]
    pub fn config(&self) -> &WorkbenchConfig {
        &self.config
    }

    /// The active part of the selected window.
    #[must_use]
    pub fn active_part(&self) -> Option<ElementId> {
        self.active_part_in(self.model.active_window()?)
    }

    /// The active part of one top-level window.
    #[must_use]
    pub fn active_part_in(&self, window: ElementId) -> Option<ElementId> {
        self.scopes.get(&window).and_then(|scope| scope.active_part)
    }

    /// Activation history of one top-level window.
    #[must_use]
    pub fn history(&self, window: ElementId) -> Option<&ActivationHistory> {
        self.scopes.get(&window).map(|scope| &scope.history)
    }

    #[must_use]
    pub fn is_part_visible(&self, part: ElementId) -> bool {
        self.model.get(part).is_some_and(ModelElement::is_part) && effectively_visible(&self.model, part)
    }

    /// Parts reachable from the selected window, including inactive
    /// perspectives, detached windows and shared parts behind placeholders.
    #[must_use]
    pub fn parts(&self) -> Vec<ElementId> {
        let Some(window) = self.model.active_window() else {
            return Vec::new();
        };
        let filter = ElementFilter::new().with_type(ElementType::Part);
        find(&self.model, window, &filter, SearchScope::ANYWHERE)
    }

    #[must_use]
    pub fn dirty_parts(&self) -> Vec<ElementId> {
        self.parts()
            .into_iter()
            .filter(|part| self.model.get(*part).is_some_and(ModelElement::is_dirty))
            .collect()
    }

    /// Parts whose input URI equals `uri`.
    #[must_use]
    pub fn input_parts(&self, uri: &str) -> Vec<ElementId> {
        self.parts()
            .into_iter()
            .filter(|part| {
                self.model
                    .get(*part)
                    .and_then(ModelElement::as_part)
                    .is_some_and(|payload| payload.input_uri.as_deref() == Some(uri))
            })
            .collect()
    }

    /// The live contribution of a rendered part.
    #[must_use]
    pub fn contribution(&self, part: ElementId) -> Option<&dyn PartContribution> {
        let handle = self.model.get(part)?.as_part()?.contribution?;
        self.contributions.get(&handle).map(|contribution| &**contribution)
    }

    // ---------------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------------

    /// Activate `part` and focus it.
    pub fn activate(&mut self, part: ElementId) -> Result<()> {
        self.activate_with(part, ActivateOptions::default())
    }

    /// Make `part` the active part of its window and select that window.
    ///
    /// Selects every container on the way up, renders the part when it was
    /// hidden, and records it in the window's history. Activating the part
    /// that is already active, visible, and in the selected window does
    /// nothing.
    pub fn activate_with(&mut self, part: ElementId, options: ActivateOptions) -> Result<()> {
        let _span = tracing::debug_span!(
            "part_service.activate",
            part = %part,
            requires_focus = options.requires_focus,
        )
        .entered();

        let target = self.target(part)?;
        self.ensure_renderable(&target)?;
        if self.active_part_in(target.window) == Some(part)
            && self.model.selected(self.model.root()) == Some(target.window)
            && effectively_visible(&self.model, part)
        {
            tracing::debug!(target: targets::ACTIVATION, part = %part, "part already active");
            return Ok(());
        }

        let mut tx = self.begin();
        self.promote(&mut tx, &target)?;
        if !options.requires_focus {
            tx.focus = None;
        }
        self.finish(tx)
    }

    /// Clear `part`'s selection in its container.
    ///
    /// Only acts when the container currently selects the part (or its local
    /// placeholder). The window is left without an active part when `part`
    /// was it; no successor is chosen.
    pub fn deactivate(&mut self, part: ElementId) -> Result<()> {
        let _span = tracing::debug_span!("part_service.deactivate", part = %part).entered();

        let target = self.target(part)?;
        let Some(container) = self.model.parent(target.local) else {
            return Err(WorkbenchError::invalid(part, "part has no container"));
        };
        if self.model.selected(container) != Some(target.local) {
            tracing::debug!(target: targets::ACTIVATION, part = %part, "part not selected");
            return Ok(());
        }

        let mut tx = self.begin();
        self.model.set_selected(container, None)?;
        if self.active_part_in(target.window) == Some(part) {
            self.set_active(&mut tx, target.window, None)?;
        }
        tracing::debug!(
            target: targets::ACTIVATION,
            part = %part,
            container = %container,
            "part deactivated"
        );
        self.finish(tx)
    }

    /// Select `part` in its container chain without moving activation,
    /// unless the selection covers the window's active part.
    pub fn bring_to_top(&mut self, part: ElementId) -> Result<()> {
        let _span = tracing::debug_span!("part_service.bring_to_top", part = %part).entered();

        let target = self.target(part)?;
        self.ensure_renderable(&target)?;
        let mut tx = self.begin();
        self.raise(&mut tx, &target)?;
        self.finish(tx)
    }

    /// Hide `part`.
    ///
    /// The node standing for the part in the layout (the part or its local
    /// placeholder) stops being rendered. It is destroyed when `force` is
    /// set or the part carries the remove-on-hide tag. Hiding the active
    /// part activates the most recent visible part of the window, else a
    /// visible former sibling, else leaves the window without an active part.
    pub fn hide_part(&mut self, part: ElementId, force: bool) -> Result<()> {
        let _span = tracing::debug_span!("part_service.hide", part = %part, force).entered();

        let target = self.target(part)?;
        let element = self.model.element(part)?;
        let remove = force || element.has_tag(&self.config.remove_on_hide_tag);
        let current = element.cur_shared_ref;
        let Some(container) = self.model.parent(target.local) else {
            return Err(WorkbenchError::invalid(part, "part has no container"));
        };

        let mut tx = self.begin();
        if target.local != part && current != Some(target.local) {
            if remove {
                self.discard(target.local)?;
            }
            tracing::debug!(
                target: targets::HIDE,
                part = %part,
                placeholder = %target.local,
                removed = remove,
                "hid a placeholder that was not realizing the part"
            );
            return self.finish(tx);
        }

        let was_active = self.active_part_in(target.window) == Some(part);
        if self.model.selected(container) == Some(target.local) {
            let replacement = self
                .scopes
                .get(&target.window)
                .and_then(|scope| scope.history.sibling_candidate(&self.model, container, part))
                .or_else(|| {
                    self.model.children(container).iter().copied().find(|child| {
                        *child != target.local
                            && self.model.get(*child).is_some_and(|node| node.to_be_rendered)
                    })
                });
            self.model.set_selected(container, replacement)?;
        }

        self.model.set_to_be_rendered(target.local, false)?;
        if remove {
            if target.local != part && self.model.placeholders_for(part).len() <= 1 {
                self.model.set_to_be_rendered(part, false)?;
            }
            self.discard(target.local)?;
        }
        self.settle()?;

        if was_active {
            let successor = self.scopes.get(&target.window).and_then(|scope| {
                scope
                    .history
                    .pick_successor(&self.model, part, Some(container))
            });
            self.set_active(&mut tx, target.window, successor)?;
            tx.topped = successor;
            tx.focus = successor;
            tracing::debug!(
                target: targets::HIDE,
                part = %part,
                successor = ?successor,
                "active part hidden"
            );
        }
        tx.hidden = Some(part);
        self.finish(tx)
    }

    /// Select `perspective` in its stack and settle the window's activation.
    ///
    /// The active part survives when it is still visible. Otherwise the most
    /// recently active visible part of the perspective takes over, then its
    /// first visible part, then nothing. Focus is re-asserted either way.
    pub fn switch_perspective(&mut self, perspective: ElementId) -> Result<()> {
        let _span =
            tracing::debug_span!("part_service.switch_perspective", perspective = %perspective)
                .entered();

        let element = self.model.element(perspective)?;
        if element.role() != Some(ContainerRole::Perspective) {
            return Err(WorkbenchError::invalid(perspective, "not a perspective"));
        }
        let Some(path) = render_path(&self.model, perspective) else {
            return Err(WorkbenchError::invalid(perspective, "perspective is not in any window"));
        };
        let window = path.window;

        let mut tx = self.begin();
        self.model.set_to_be_rendered(perspective, true)?;
        for step in path.steps.iter().filter(|step| step.link == StepLink::Child) {
            self.model.set_selected(step.container, Some(step.child))?;
        }
        self.settle()?;

        let old = self.active_part_in(window);
        let next = match old {
            Some(part) if self.is_part_visible(part) => Some(part),
            _ => self
                .scopes
                .get(&window)
                .and_then(|scope| scope.history.candidate_within(&self.model, perspective))
                .or_else(|| self.first_visible_part(perspective)),
        };
        if next == old {
            if let Some(part) = next {
                self.scope_mut(window).history.record(part);
            }
        } else {
            self.set_active(&mut tx, window, next)?;
            tx.topped = next;
        }
        tx.focus = next;
        tracing::debug!(
            target: targets::PERSPECTIVE,
            perspective = %perspective,
            window = %window,
            kept = next.is_some() && next == old,
            active = ?next,
            "perspective switched"
        );
        self.finish(tx)
    }

    /// Toggle a part's dirty flag.
    pub fn set_dirty(&mut self, part: ElementId, dirty: bool) -> Result<()> {
        self.model.set_dirty(part, dirty)?;
        self.publish_deltas();
        Ok(())
    }

    /// Render whatever the model says should be on screen and publish
    /// pending model changes.
    pub fn sync_presentation(&mut self) -> Result<()> {
        let tx = self.begin();
        self.finish(tx)
    }

    // ---------------------------------------------------------------------
    // Targets
    // ---------------------------------------------------------------------

    /// Resolve `part` to its layout node and window.
    pub(crate) fn target(&self, part: ElementId) -> Result<Target> {
        let element = self.model.element(part)?;
        if !element.is_part() {
            return Err(WorkbenchError::invalid(part, "not a part"));
        }
        let local = if element.is_shared() {
            self.local_placeholder(part).ok_or_else(|| {
                WorkbenchError::invalid(part, "shared part has no placeholder in any window")
            })?
        } else {
            part
        };
        let path = render_path(&self.model, local)
            .ok_or_else(|| WorkbenchError::invalid(part, "part is not in any window"))?;
        Ok(Target {
            part,
            local,
            window: path.window,
        })
    }

    /// Refuse targets under a container that is not to be rendered.
    pub(crate) fn ensure_renderable(&self, target: &Target) -> Result<()> {
        let path = render_path(&self.model, target.local)
            .ok_or_else(|| WorkbenchError::invalid(target.part, "part is not in any window"))?;
        let blocked = path
            .nodes()
            .skip(1)
            .any(|id| self.model.get(id).is_some_and(|node| !node.to_be_rendered));
        if blocked {
            return Err(WorkbenchError::invalid(
                target.part,
                "an enclosing container is not rendered",
            ));
        }
        Ok(())
    }

    /// The container new parts of `window` are shown in: the selected
    /// perspective when the window has perspectives, otherwise the window.
    pub(crate) fn presentation_root(&self, window: ElementId) -> ElementId {
        let filter =
            ElementFilter::new().with_type(ElementType::Role(ContainerRole::PerspectiveStack));
        find_first(&self.model, window, &filter, SearchScope::OUTSIDE_PERSPECTIVE)
            .and_then(|stack| self.model.selected(stack))
            .unwrap_or(window)
    }

    /// The placeholder realizing `shared` in its window's presentation root,
    /// preferring the current one, else any placeholder in a window.
    fn local_placeholder(&self, shared: ElementId) -> Option<ElementId> {
        let window = self.model.get(shared)?.pool_owner?;
        let root = self.presentation_root(window);
        let current = self.model.get(shared)?.cur_shared_ref;
        let placeholders = self.model.placeholders_for(shared);
        let local: Vec<ElementId> = placeholders
            .iter()
            .copied()
            .filter(|placeholder| contains(&self.model, root, *placeholder))
            .collect();
        if let Some(current) = current
            && local.contains(&current)
        {
            return Some(current);
        }
        if let Some(first) = local.first() {
            return Some(*first);
        }
        current
            .into_iter()
            .chain(placeholders)
            .find(|placeholder| render_path(&self.model, *placeholder).is_some())
    }

    fn first_visible_part(&self, container: ElementId) -> Option<ElementId> {
        let filter = ElementFilter::new().with_type(ElementType::Part);
        find(&self.model, container, &filter, SearchScope::PRESENTATION)
            .into_iter()
            .find(|part| effectively_visible(&self.model, *part))
    }

    // ---------------------------------------------------------------------
    // Activation internals
    // ---------------------------------------------------------------------

    /// Render the target and select it through its whole ancestor chain.
    pub(crate) fn reveal(&mut self, target: &Target) -> Result<()> {
        if target.local != target.part {
            self.model
                .set_current_placeholder(target.part, Some(target.local))?;
        }
        self.model.set_to_be_rendered(target.local, true)?;
        self.model.set_to_be_rendered(target.part, true)?;
        let path = render_path(&self.model, target.part)
            .ok_or_else(|| WorkbenchError::invalid(target.part, "part is not in any window"))?;
        for step in path.steps.iter().filter(|step| step.link == StepLink::Child) {
            self.model.set_selected(step.container, Some(step.child))?;
        }
        Ok(())
    }

    /// Full activation: reveal, select the window, record, focus.
    pub(crate) fn promote(&mut self, tx: &mut Transition, target: &Target) -> Result<()> {
        self.reveal(target)?;
        let root = self.model.root();
        self.model.set_selected(root, Some(target.window))?;
        self.set_active(tx, target.window, Some(target.part))?;
        tx.topped = Some(target.part);
        tx.focus = Some(target.part);
        tracing::debug!(
            target: targets::ACTIVATION,
            part = %target.part,
            window = %target.window,
            tick = self.clock,
            "part activated"
        );
        Ok(())
    }

    /// Bring-to-top: reveal, then activate only when the window's active
    /// part was covered by the new selection.
    pub(crate) fn raise(&mut self, tx: &mut Transition, target: &Target) -> Result<()> {
        let active = self.active_part_in(target.window);
        self.reveal(target)?;
        self.settle()?;
        tx.topped = Some(target.part);
        match active {
            Some(active) if active != target.part && !effectively_visible(&self.model, active) => {
                tracing::debug!(
                    target: targets::ACTIVATION,
                    part = %target.part,
                    obscured = %active,
                    "bring to top covered the active part"
                );
                self.set_active(tx, target.window, Some(target.part))?;
                tx.focus = Some(target.part);
            }
            _ => {
                tracing::debug!(target: targets::ACTIVATION, part = %target.part, "part brought to top");
            }
        }
        Ok(())
    }

    fn scope_mut(&mut self, window: ElementId) -> &mut WindowScope {
        let depth = self.config.history_depth;
        self.scopes.entry(window).or_insert_with(|| WindowScope {
            active_part: None,
            history: ActivationHistory::new(depth),
        })
    }

    pub(crate) fn set_active(
        &mut self,
        tx: &mut Transition,
        window: ElementId,
        new: Option<ElementId>,
    ) -> Result<()> {
        let scope = self.scope_mut(window);
        let old = scope.active_part;
        scope.active_part = new;
        if let Some(part) = new {
            scope.history.record(part);
            self.clock += 1;
            self.model.set_last_activation(part, self.clock)?;
        }
        tx.activation = Some(match tx.activation {
            Some(change) if change.window == window => ActivationChange { new, ..change },
            _ => ActivationChange { window, old, new },
        });
        Ok(())
    }

    fn focus(&mut self, part: ElementId) {
        let handle = self
            .model
            .get(part)
            .and_then(ModelElement::as_part)
            .and_then(|payload| payload.contribution);
        let contribution = handle
            .and_then(|handle| self.contributions.get_mut(&handle))
            .map(|contribution| &mut **contribution as &mut dyn PartContribution);
        self.presentation.focus(&self.model, part, contribution);
    }

    // ---------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------

    pub(crate) fn begin(&self) -> Transition {
        Transition {
            before: self.visible_parts(),
            activation: None,
            hidden: None,
            topped: None,
            focus: None,
        }
    }

    /// Settle the model, focus, then notify listeners and the bus.
    ///
    /// Listener order: `deactivated`, `hidden`*, `activated`, `visible`*,
    /// `brought_to_top`.
    pub(crate) fn finish(&mut self, tx: Transition) -> Result<()> {
        self.settle()?;
        if self.config.focus_on_activate
            && let Some(part) = tx.focus
        {
            self.focus(part);
        }

        let after = self.visible_parts();
        let change = tx.activation.filter(|change| change.old != change.new);
        let activated = change.and_then(|change| change.new);
        let mut events = Vec::new();
        if let Some(old) = change.and_then(|change| change.old) {
            events.push(PartEvent::new(PartEventKind::Deactivated, old));
        }
        if let Some(hidden) = tx.hidden {
            events.push(PartEvent::new(PartEventKind::Hidden, hidden));
        }
        events.extend(
            tx.before
                .difference(&after)
                .filter(|part| Some(**part) != tx.hidden)
                .map(|part| PartEvent::new(PartEventKind::Hidden, *part)),
        );
        if let Some(new) = activated {
            events.push(PartEvent::new(PartEventKind::Activated, new));
            events.push(PartEvent::new(PartEventKind::Visible, new));
        }
        events.extend(
            after
                .difference(&tx.before)
                .filter(|part| Some(**part) != activated)
                .map(|part| PartEvent::new(PartEventKind::Visible, *part)),
        );
        if let Some(topped) = tx.topped {
            events.push(PartEvent::new(PartEventKind::BroughtToTop, topped));
        }

        self.publish_deltas();
        for event in events {
            self.listeners.dispatch(event);
            self.bus.publish(&WorkbenchEvent::Part(event));
        }
        if let Some(change) = change {
            self.bus.publish(&WorkbenchEvent::ActivePartChanged {
                window: change.window,
                old: change.old,
                new: change.new,
            });
        }
        Ok(())
    }

    pub(crate) fn publish_deltas(&mut self) {
        for delta in self.model.drain_deltas() {
            self.bus.publish(&WorkbenchEvent::Model(delta));
        }
    }

    fn visible_parts(&self) -> BTreeSet<ElementId> {
        self.model
            .elements()
            .filter(|element| element.is_part())
            .map(|element| element.id)
            .filter(|part| effectively_visible(&self.model, *part))
            .collect()
    }

    // ---------------------------------------------------------------------
    // Settling: shared references and widgets
    // ---------------------------------------------------------------------

    pub(crate) fn settle(&mut self) -> Result<()> {
        self.repoint_shared()?;
        self.reconcile_widgets()
    }

    /// Move shared elements whose current placeholder left the active layout.
    ///
    /// Repeats until stable so shared areas re-pointed in one pass expose
    /// their nested placeholders to the next.
    fn repoint_shared(&mut self) -> Result<()> {
        let pooled: Vec<ElementId> = self
            .model
            .windows()
            .iter()
            .filter_map(|window| self.model.get(*window).and_then(ModelElement::as_container))
            .flat_map(|window| window.shared_elements.iter().copied())
            .collect();

        for _ in 0..=pooled.len() {
            let mut changed = false;
            for shared in &pooled {
                let Some(current) = self.model.get(*shared).map(|element| element.cur_shared_ref)
                else {
                    continue;
                };
                if current.is_some_and(|placeholder| in_active_layout(&self.model, placeholder)) {
                    continue;
                }
                let candidates: Vec<ElementId> = self
                    .model
                    .placeholders_for(*shared)
                    .into_iter()
                    .filter(|placeholder| in_active_layout(&self.model, *placeholder))
                    .collect();
                let best = candidates
                    .iter()
                    .copied()
                    .find(|placeholder| selected_chain(&self.model, *placeholder))
                    .or_else(|| candidates.first().copied());
                if let Some(best) = best
                    && Some(best) != current
                {
                    tracing::debug!(
                        target: targets::PERSPECTIVE,
                        element = %shared,
                        placeholder = %best,
                        "shared element re-pointed"
                    );
                    self.model.set_current_placeholder(*shared, Some(best))?;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        Ok(())
    }

    /// Render everything that should be on screen and unrender the rest.
    ///
    /// Children of tab stacks and perspective stacks are rendered lazily:
    /// an unselected child is only walked once it has a widget.
    fn reconcile_widgets(&mut self) -> Result<()> {
        let mut live = FxHashSet::default();
        let windows = self.model.windows().to_vec();
        for window in windows {
            self.realize(window, None, &mut live)?;
        }
        let stale: Vec<ElementId> = self
            .model
            .elements()
            .filter(|element| element.widget.is_some() && !live.contains(&element.id))
            .map(|element| element.id)
            .collect();
        for element in stale {
            if self.model.get(element).is_some_and(|node| node.widget.is_some()) {
                self.unrender_subtree(element, &live)?;
            }
        }
        Ok(())
    }

    fn realize(
        &mut self,
        element: ElementId,
        parent_widget: Option<WidgetHandle>,
        live: &mut FxHashSet<ElementId>,
    ) -> Result<()> {
        enum Plan {
            Container {
                children: Vec<ElementId>,
                windows: Vec<ElementId>,
                selected: Option<ElementId>,
                single: bool,
            },
            Placeholder(ElementId),
            Part {
                instantiated: bool,
            },
            Leaf,
        }

        let Some(node) = self.model.get(element) else {
            return Ok(());
        };
        if !node.to_be_rendered || !live.insert(element) {
            return Ok(());
        }
        let existing = node.widget;
        let plan = match &node.kind {
            ElementKind::Container(container) if container.role.is_menu() => Plan::Leaf,
            ElementKind::Container(container) => Plan::Container {
                children: container.children.clone(),
                windows: container.windows.clone(),
                selected: container.selected,
                single: container.role.shows_single_child(),
            },
            ElementKind::Placeholder(placeholder) => Plan::Placeholder(placeholder.reference),
            ElementKind::Part(part) => Plan::Part {
                instantiated: part.contribution.is_some(),
            },
            ElementKind::Item(_) => Plan::Leaf,
        };

        let widget = match existing {
            Some(widget) => Some(widget),
            None => {
                let widget = self.presentation.render(&self.model, element, parent_widget);
                self.model.set_widget(element, widget)?;
                widget
            }
        };

        match plan {
            Plan::Container {
                children,
                windows,
                selected,
                single,
            } => {
                for child in children {
                    let lazy = single
                        && selected != Some(child)
                        && self.model.get(child).is_some_and(|node| node.widget.is_none());
                    if !lazy {
                        self.realize(child, widget, live)?;
                    }
                }
                for window in windows {
                    self.realize(window, widget, live)?;
                }
            }
            Plan::Placeholder(reference) if self.model.is_current(element) => {
                let rendered = self
                    .model
                    .get(reference)
                    .is_some_and(|node| node.widget.is_some());
                if rendered && self.hosts.get(&reference) != Some(&element) {
                    self.presentation.reparent(&self.model, reference, widget);
                }
                let _ = self.hosts.insert(reference, element);
                self.realize(reference, widget, live)?;
            }
            Plan::Part {
                instantiated: false,
            } if widget.is_some() => self.instantiate(element)?,
            Plan::Placeholder(_) | Plan::Part { .. } | Plan::Leaf => {}
        }
        Ok(())
    }

    fn instantiate(&mut self, part: ElementId) -> Result<()> {
        if let Some(contribution) = self.presentation.instantiate(&self.model, part) {
            self.next_contribution += 1;
            let handle = ContributionHandle(self.next_contribution);
            let _ = self.contributions.insert(handle, contribution);
            self.model.set_contribution(part, Some(handle))?;
        }
        Ok(())
    }

    /// Unrender `element` after everything rendered below it, skipping
    /// nodes in `keep`.
    fn unrender_subtree(&mut self, element: ElementId, keep: &FxHashSet<ElementId>) -> Result<()> {
        if keep.contains(&element) {
            return Ok(());
        }
        let nested: Vec<ElementId> = match self.model.get(element).map(|node| &node.kind) {
            Some(ElementKind::Container(container)) => container
                .children
                .iter()
                .chain(&container.windows)
                .copied()
                .collect(),
            Some(ElementKind::Placeholder(placeholder))
                if self.hosts.get(&placeholder.reference) == Some(&element) =>
            {
                vec![placeholder.reference]
            }
            _ => Vec::new(),
        };
        for child in nested {
            self.unrender_subtree(child, keep)?;
        }
        if self.model.get(element).is_some_and(|node| node.widget.is_some()) {
            self.presentation.unrender(&self.model, element);
            self.model.set_widget(element, None)?;
            let _ = self.hosts.remove(&element);
        }
        let handle = self
            .model
            .get(element)
            .and_then(ModelElement::as_part)
            .and_then(|part| part.contribution);
        if let Some(handle) = handle {
            let _ = self.contributions.remove(&handle);
            self.model.set_contribution(element, None)?;
        }
        Ok(())
    }

    /// Unrender and destroy a layout node removed by a hide.
    fn discard(&mut self, element: ElementId) -> Result<()> {
        self.unrender_subtree(element, &FxHashSet::default())?;
        self.model.destroy(element)?;
        for scope in self.scopes.values_mut() {
            let _ = scope.history.prune_stale(&self.model);
        }
        tracing::debug!(target: targets::HIDE, element = %element, "layout node removed");
        Ok(())
    }
}
