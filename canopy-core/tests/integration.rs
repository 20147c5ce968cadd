//! Integration Tests for the Reconciliation Runtime
//!
//! These tests drive components through the public runtime API against the
//! in-memory platform and check the resulting live tree, the mutation log,
//! references and lifecycle hooks.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use canopy_core::platform::memory::{MemoryPlatform, Mutation};
use canopy_core::{
    children, Capabilities, Component, ComponentRef, ComponentTag, ComponentType, Completion,
    Error, Event, FrameScheduler, Listener, NodeHandle, Platform, Props, Ref, RefTarget, Result,
    Runtime, TaskScheduler, VNode, WeakComponentRef,
};
use futures_util::FutureExt;

// ---- Fixtures ----

thread_local! {
    static EVENTS: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

fn record(event: impl Into<String>) {
    EVENTS.with(|events| events.borrow_mut().push(event.into()));
}

fn take_events() -> Vec<String> {
    EVENTS.with(|events| std::mem::take(&mut *events.borrow_mut()))
}

fn setup() -> (Rc<MemoryPlatform>, Runtime) {
    let platform = Rc::new(MemoryPlatform::new());
    let runtime = Runtime::new(platform.clone());
    (platform, runtime)
}

fn label_of(props: &Props) -> String {
    props
        .get("label")
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// Live children of `parent` paired with their text.
fn live_items(platform: &MemoryPlatform, parent: NodeHandle) -> Vec<(String, NodeHandle)> {
    platform
        .children(parent)
        .into_iter()
        .map(|child| (platform.text_content(child), child))
        .collect()
}

struct TodoList {
    items: Vec<&'static str>,
    keyed: bool,
}

impl Component for TodoList {
    fn render(&self) -> Result<VNode> {
        let items = self
            .items
            .iter()
            .map(|item| {
                let props = if self.keyed {
                    Props::new().with_key(*item)
                } else {
                    Props::new()
                };
                VNode::element("li", props, vec![VNode::text(*item)])
            })
            .collect();
        Ok(VNode::element("ul", Props::new(), items))
    }
}

struct Child {
    label: String,
}

impl Component for Child {
    fn render(&self) -> Result<VNode> {
        Ok(VNode::element(
            "span",
            Props::new(),
            vec![VNode::text(self.label.clone())],
        ))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::STATEFUL.with_after_update()
    }

    fn update(&mut self, props: &Props, _children: &[VNode]) -> bool {
        self.label = label_of(props);
        true
    }

    fn destroy(&mut self) {
        record(format!("destroy {}", self.label));
    }

    fn write_after_update(&mut self) {
        record("child write");
    }

    fn read_after_update(&self) {
        record("child read");
    }
}

impl ComponentType for Child {
    const NAME: &'static str = "Child";

    fn create(props: &Props, _children: &[VNode]) -> Result<Self> {
        Ok(Self {
            label: label_of(props),
        })
    }
}

struct Parent {
    labels: Vec<&'static str>,
}

impl Component for Parent {
    fn render(&self) -> Result<VNode> {
        let children = self
            .labels
            .iter()
            .map(|label| {
                let props = Props::new()
                    .with_key(*label)
                    .with("label", *label)
                    .with_ref(format!("children/{label}"));
                VNode::component(ComponentTag::of::<Child>(), props, vec![])
            })
            .collect();
        Ok(VNode::element("section", Props::new(), children))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::RENDER.with_after_update()
    }

    fn write_after_update(&mut self) {
        record("parent write");
    }

    fn read_after_update(&self) {
        record("parent read");
    }
}

struct Tally {
    value: u32,
    renders: Cell<u32>,
}

impl Tally {
    fn new() -> Self {
        Self {
            value: 0,
            renders: Cell::new(0),
        }
    }
}

impl Component for Tally {
    fn render(&self) -> Result<VNode> {
        self.renders.set(self.renders.get() + 1);
        Ok(VNode::element(
            "output",
            Props::new(),
            vec![VNode::text(self.value.to_string())],
        ))
    }
}

// ---- Diffing ----

/// Test that re-rendering an unchanged component touches nothing.
#[test]
fn unchanged_render_performs_no_mutations() {
    let (platform, runtime) = setup();
    let list = runtime
        .mount(TodoList {
            items: vec!["a", "b", "c"],
            keyed: true,
        })
        .unwrap();
    platform.take_mutations();

    runtime.update_sync(&list).unwrap();
    assert!(platform.mutations().is_empty());
}

/// Test that a keyed permutation reuses every live node.
#[test]
fn keyed_reorder_preserves_node_identity() {
    let (platform, runtime) = setup();
    let list = runtime
        .mount(TodoList {
            items: vec!["a", "b", "c", "d"],
            keyed: true,
        })
        .unwrap();
    let ul = list.element().unwrap();
    let before = live_items(&platform, ul);

    list.with_mut(|l: &mut TodoList| l.items = vec!["d", "b", "a", "c"])
        .unwrap();
    platform.take_mutations();
    runtime.update_sync(&list).unwrap();

    let after = live_items(&platform, ul);
    let order: Vec<_> = after.iter().map(|(text, _)| text.as_str()).collect();
    assert_eq!(order, ["d", "b", "a", "c"]);
    for (text, node) in &after {
        let original = before.iter().find(|(t, _)| t == text).map(|(_, n)| *n);
        assert_eq!(original, Some(*node), "item {text} was recreated");
    }
    assert!(!platform
        .mutations()
        .iter()
        .any(|m| matches!(m, Mutation::Create(_) | Mutation::Remove(_))));
}

/// Test that appending to an unkeyed list creates exactly one new item.
#[test]
fn unkeyed_append_creates_one_item() {
    let (platform, runtime) = setup();
    let list = runtime
        .mount(TodoList {
            items: vec!["x", "y"],
            keyed: false,
        })
        .unwrap();
    let ul = list.element().unwrap();
    let before = platform.children(ul);

    list.with_mut(|l: &mut TodoList| l.items.push("z")).unwrap();
    platform.take_mutations();
    runtime.update_sync(&list).unwrap();

    let after = platform.children(ul);
    assert_eq!(after[..2], before[..]);
    let log = platform.mutations();
    let inserted: Vec<_> = log
        .iter()
        .filter(|m| matches!(m, Mutation::Insert { parent, .. } if *parent == ul))
        .collect();
    assert_eq!(inserted.len(), 1);
    assert_eq!(platform.text_content(ul), "xyz");
}

fn fruit_list(items: &[&str]) -> VNode {
    let children = items
        .iter()
        .map(|item| {
            VNode::element(
                "li",
                Props::new().with_key(*item).with("title", *item),
                vec![VNode::text(*item)],
            )
        })
        .collect();
    VNode::element("ul", Props::new().with("className", "fruit"), children)
}

/// Test that patching a tree into the same description twice matches a
/// fresh render and leaves nothing to do the second time.
#[test]
fn repeated_patch_is_idempotent() {
    let cases: [(&[&str], &[&str]); 5] = [
        (&["apple", "pear", "plum"], &["plum", "fig", "apple"]),
        (&["apple", "pear"], &[]),
        (&[], &["kiwi", "lime"]),
        (&["a", "b", "c", "d", "e"], &["e", "c", "a", "f", "b"]),
        (&["a", "b", "c"], &["b", "c", "a", "d"]),
    ];

    for (before, after) in cases {
        let (platform, runtime) = setup();
        let mut first = fruit_list(before);
        let node = runtime.render(&mut first).unwrap();
        let mut second = fruit_list(after);
        assert_eq!(runtime.patch(&first, &mut second).unwrap(), node);

        platform.take_mutations();
        let mut third = fruit_list(after);
        assert_eq!(runtime.patch(&second, &mut third).unwrap(), node);
        assert!(
            platform.mutations().is_empty(),
            "second patch to {after:?} mutated the tree"
        );

        let (fresh_platform, fresh_runtime) = setup();
        let fresh = fresh_runtime.render(&mut fruit_list(after)).unwrap();
        assert_eq!(platform.markup(node), fresh_platform.markup(fresh));
    }
}

/// Test that a root tag change is rejected and leaves the tree alone.
#[test]
fn root_tag_change_fails_scheduled_update() {
    struct Morph {
        tag: &'static str,
    }

    impl Component for Morph {
        fn render(&self) -> Result<VNode> {
            Ok(VNode::element(self.tag, Props::new(), vec![]))
        }
    }

    let (platform, runtime) = setup();
    let morph = runtime.mount(Morph { tag: "div" }).unwrap();
    let element = morph.element().unwrap();

    morph.with_mut(|m: &mut Morph| m.tag = "p").unwrap();
    runtime.update(&morph).unwrap();
    let err = runtime.perform_updates().unwrap_err();
    assert!(matches!(err, Error::RootIdentity { .. }));
    assert_eq!(morph.element(), Some(element));
    assert_eq!(platform.tag(element).as_deref(), Some("div"));

    // The failed request is no longer pending, so a new one is accepted.
    morph.with_mut(|m: &mut Morph| m.tag = "div").unwrap();
    runtime.update(&morph).unwrap();
    runtime.perform_updates().unwrap();
}

// ---- Components ----

/// Test that write hooks run child first and reads run after all writes.
#[test]
fn after_update_hooks_are_ordered() {
    let (_platform, runtime) = setup();
    let parent = runtime.mount(Parent { labels: vec!["a"] }).unwrap();
    take_events();

    runtime.update_sync(&parent).unwrap();
    assert_eq!(take_events(), ["child write", "parent write"]);

    runtime.perform_updates().unwrap();
    assert_eq!(take_events(), ["child read", "parent read"]);
}

struct SelfMeasuring {
    runtime: Runtime,
    this: Option<WeakComponentRef>,
    width: u32,
    measurements_left: u32,
    renders: Cell<u32>,
}

impl Component for SelfMeasuring {
    fn render(&self) -> Result<VNode> {
        self.renders.set(self.renders.get() + 1);
        Ok(VNode::element(
            "div",
            Props::new(),
            vec![VNode::text(self.width.to_string())],
        ))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::RENDER.with_after_update()
    }

    fn write_after_update(&mut self) {
        if self.measurements_left == 0 {
            return;
        }
        self.measurements_left -= 1;
        self.width += 10;
        if let Some(this) = self.this.as_ref().and_then(WeakComponentRef::upgrade) {
            self.runtime.update(&this).unwrap();
        }
    }
}

/// Test that a write hook asking for its own update re-renders the
/// component once the hook has returned.
#[test]
fn write_hook_can_request_its_own_update() {
    let (platform, runtime) = setup();
    let measuring = runtime
        .mount(SelfMeasuring {
            runtime: runtime.clone(),
            this: None,
            width: 0,
            measurements_left: 2,
            renders: Cell::new(0),
        })
        .unwrap();
    let this = measuring.downgrade();
    measuring
        .with_mut(|m: &mut SelfMeasuring| m.this = Some(this))
        .unwrap();

    runtime.update_sync(&measuring).unwrap();

    assert_eq!(measuring.with(|m: &SelfMeasuring| m.renders.get()), Some(4));
    assert_eq!(platform.text_content(measuring.element().unwrap()), "20");
    assert_eq!(
        measuring.with(|m: &SelfMeasuring| m.measurements_left),
        Some(0)
    );
}

struct Fragile {
    fail: Cell<bool>,
    value: u32,
}

impl Component for Fragile {
    fn render(&self) -> Result<VNode> {
        if self.fail.get() {
            panic!("render failed");
        }
        Ok(VNode::element(
            "p",
            Props::new(),
            vec![VNode::text(self.value.to_string())],
        ))
    }
}

/// Test that a render that panics leaves the component updatable.
#[test]
fn panicking_render_leaves_component_usable() {
    let (platform, runtime) = setup();
    let fragile = runtime
        .mount(Fragile {
            fail: Cell::new(false),
            value: 1,
        })
        .unwrap();

    fragile.with(|f: &Fragile| f.fail.set(true)).unwrap();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        runtime.update_sync(&fragile)
    }));
    assert!(outcome.is_err());

    fragile
        .with_mut(|f: &mut Fragile| {
            f.fail.set(false);
            f.value = 2;
        })
        .unwrap();
    runtime.update_sync(&fragile).unwrap();
    assert_eq!(platform.text_content(fragile.element().unwrap()), "2");
}

/// Test that removed child components are destroyed exactly once.
#[test]
fn child_components_are_destroyed_exactly_once() {
    let (platform, runtime) = setup();
    let body = platform.create_root("body");
    let parent = runtime.mount(Parent { labels: vec!["a", "b"] }).unwrap();
    platform.insert_before(body, parent.element().unwrap(), None);
    let a = parent.refs().component("children/a").unwrap();
    take_events();

    parent.with_mut(|p: &mut Parent| p.labels = vec!["b"]).unwrap();
    runtime.update_sync(&parent).unwrap();
    let destroyed: Vec<_> = take_events()
        .into_iter()
        .filter(|e| e.starts_with("destroy"))
        .collect();
    assert_eq!(destroyed, ["destroy a"]);
    assert!(a.is_destroyed());
    assert!(!parent.refs().contains("children/a"));

    runtime.destroy_sync(&parent);
    runtime.destroy_sync(&parent);
    assert_eq!(take_events(), ["destroy b"]);
    assert!(platform.children(body).is_empty());
}

/// Test that a child component's props flow through `update`.
#[test]
fn child_components_receive_new_props() {
    let (platform, runtime) = setup();
    let parent = runtime.mount(Parent { labels: vec!["a"] }).unwrap();
    let child = parent.refs().component("children/a").unwrap();
    let child_element = child.element().unwrap();

    parent.with_mut(|p: &mut Parent| p.labels = vec!["a", "b"]).unwrap();
    runtime.update_sync(&parent).unwrap();

    assert_eq!(child.element(), Some(child_element));
    assert_eq!(platform.text_content(parent.element().unwrap()), "ab");
    assert!(parent.refs().contains("children/b"));
}

/// Test that stateless components built from registered names render and
/// re-render with new props.
#[test]
fn registered_stateless_components_render() {
    fn badge(props: &Props, children: &[VNode]) -> Result<VNode> {
        let mut content = vec![VNode::text(label_of(props))];
        content.extend(children.iter().cloned());
        Ok(VNode::element(
            "span",
            Props::new().with("className", "badge"),
            content,
        ))
    }

    let (platform, runtime) = setup();
    runtime
        .register_element("x-badge", ComponentTag::stateless("Badge", badge))
        .unwrap();

    let mut old = runtime
        .element("x-badge", Props::new().with("label", "3"), children!["!"])
        .unwrap();
    let node = runtime.render(&mut old).unwrap();
    assert_eq!(platform.markup(node), r#"<span className="badge">3!</span>"#);

    let mut new = runtime
        .element("x-badge", Props::new().with("label", "4"), children!["!"])
        .unwrap();
    assert_eq!(runtime.patch(&old, &mut new).unwrap(), node);
    assert_eq!(platform.text_content(node), "4!");
    assert_eq!(new.instance(), old.instance());
}

/// Test registry error reporting.
#[test]
fn registry_rejects_misuse() {
    fn empty(_props: &Props, _children: &[VNode]) -> Result<VNode> {
        Ok(VNode::text(""))
    }

    let (_platform, runtime) = setup();
    let tag = ComponentTag::stateless("Empty", empty);
    runtime.register_element("x-empty", tag.clone()).unwrap();

    assert!(matches!(
        runtime.register_element("x-empty", tag.clone()),
        Err(Error::DuplicateRegistration(_))
    ));
    runtime.unregister_element("x-empty").unwrap();
    assert!(matches!(
        runtime.unregister_element("x-empty"),
        Err(Error::AlreadyUnregistered(_))
    ));
    assert!(matches!(
        runtime.element("x-empty", Props::new(), children![]),
        Err(Error::NotRegistered(_))
    ));
}

/// Test that removing a free-standing tree destroys its components.
#[test]
fn removing_a_tree_destroys_nested_components() {
    let (platform, runtime) = setup();
    let body = platform.create_root("body");
    let mut tree = VNode::element(
        "div",
        Props::new(),
        vec![VNode::component(
            ComponentTag::of::<Child>(),
            Props::new().with("label", "nested"),
            vec![],
        )],
    );
    let node = runtime.render(&mut tree).unwrap();
    platform.insert_before(body, node, None);
    take_events();

    runtime.remove(&tree);
    assert_eq!(take_events(), ["destroy nested"]);
    assert!(platform.children(body).is_empty());
}

// ---- References and listeners ----

struct Form {
    show_email: bool,
    on_submit_ref: Ref,
}

impl Component for Form {
    fn render(&self) -> Result<VNode> {
        let mut fields = vec![VNode::element(
            "input",
            Props::new().with_ref("fields/name"),
            vec![],
        )];
        if self.show_email {
            fields.push(VNode::element(
                "input",
                Props::new().with_ref("fields[email]"),
                vec![],
            ));
        }
        fields.push(VNode::element(
            "button",
            Props::new().with_ref(self.on_submit_ref.clone()),
            vec![],
        ));
        Ok(VNode::element("form", Props::new().with_ref("form"), fields))
    }
}

/// Test the named, nested and callback reference lifecycle.
#[test]
fn references_track_live_nodes() {
    let (_platform, runtime) = setup();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let form = runtime
        .mount(Form {
            show_email: true,
            on_submit_ref: Ref::callback(move |target| log.borrow_mut().push(target.cloned())),
        })
        .unwrap();

    let refs = form.refs();
    assert_eq!(refs.node("form"), form.element());
    assert!(refs.contains("fields/name"));
    assert!(refs.contains("fields/email"));
    assert!(matches!(seen.borrow().as_slice(), [Some(RefTarget::Node(_))]));

    form.with_mut(|f: &mut Form| f.show_email = false).unwrap();
    runtime.update_sync(&form).unwrap();
    assert!(refs.contains("fields/name"));
    assert!(!refs.contains("fields/email"));
    assert_eq!(seen.borrow().len(), 1);

    runtime.destroy_sync(&form);
    assert!(refs.is_empty());
}

/// Test that subtrees with an owner context register into the owner.
#[test]
fn context_routes_refs_to_the_owner() {
    struct Host {
        guest: ComponentRef,
    }

    impl Component for Host {
        fn render(&self) -> Result<VNode> {
            let borrowed =
                VNode::element("input", Props::new().with_ref("borrowed"), vec![]).with_context(&self.guest);
            Ok(VNode::element(
                "div",
                Props::new().with_ref("own"),
                vec![borrowed],
            ))
        }
    }

    let (_platform, runtime) = setup();
    let guest = runtime.mount(Tally::new()).unwrap();
    let host = runtime.mount(Host {
        guest: guest.clone(),
    })
    .unwrap();

    assert!(host.refs().contains("own"));
    assert!(!host.refs().contains("borrowed"));
    assert!(guest.refs().contains("borrowed"));
}

struct Clicker {
    clicks: u32,
    on_click: Listener,
}

impl Clicker {
    fn new() -> Self {
        Self {
            clicks: 0,
            on_click: Listener::contextual(|_, owner| {
                owner.with_mut(|clicker: &mut Clicker| clicker.clicks += 1);
            }),
        }
    }
}

impl Component for Clicker {
    fn render(&self) -> Result<VNode> {
        Ok(VNode::element(
            "button",
            Props::new()
                .with_ref("button")
                .on("click", self.on_click.clone()),
            vec![VNode::text(self.clicks.to_string())],
        ))
    }
}

/// Test that listeners are bound to their owner and survive re-renders.
#[test]
fn listeners_are_bound_to_their_owner() {
    let (platform, runtime) = setup();
    let clicker = runtime.mount(Clicker::new()).unwrap();
    let button = clicker.refs().node("button").unwrap();

    platform.dispatch(&Event::new("click", button));
    platform.take_mutations();
    runtime.update_sync(&clicker).unwrap();

    assert_eq!(platform.text_content(button), "1");
    assert!(!platform.mutations().iter().any(|m| matches!(
        m,
        Mutation::AddListener { .. } | Mutation::RemoveListener { .. }
    )));

    platform.dispatch(&Event::new("click", button));
    assert_eq!(clicker.with(|c: &Clicker| c.clicks), Some(2));
}

// ---- Scheduling ----

/// Test that many update requests in one turn produce one frame and one
/// render per component.
#[test]
fn updates_are_batched_into_one_frame() {
    let (_platform, runtime) = setup();
    let frames = Rc::new(Cell::new(0));
    let counter = frames.clone();
    runtime.set_scheduler(Rc::new(FrameScheduler::with_requester(move || {
        counter.set(counter.get() + 1)
    })));

    let a = runtime.mount(Tally::new()).unwrap();
    let b = runtime.mount(Tally::new()).unwrap();
    for _ in 0..3 {
        runtime.update(&a).unwrap();
    }
    runtime.update(&b).unwrap();
    assert_eq!(frames.get(), 1);

    runtime.perform_updates().unwrap();
    assert_eq!(a.with(|t: &Tally| t.renders.get()), Some(2));
    assert_eq!(b.with(|t: &Tally| t.renders.get()), Some(2));
}

/// Test that the completion of a scheduled update resolves once the batch
/// has run.
#[tokio::test]
async fn update_completion_resolves_after_batch() {
    let (platform, runtime) = setup();
    let tally = runtime.mount(Tally::new()).unwrap();

    tally.with_mut(|t: &mut Tally| t.value = 7).unwrap();
    let completion = runtime.update(&tally).unwrap();
    runtime.perform_updates().unwrap();
    completion.await;

    assert_eq!(platform.text_content(tally.element().unwrap()), "7");
}

/// Test that an update requested while a batch is running joins that batch
/// and is done when the batch's completion resolves.
#[test]
fn update_requested_during_a_batch_joins_it() {
    let (platform, runtime) = setup();
    let tally = runtime.mount(Tally::new()).unwrap();
    let inner_completion: Rc<RefCell<Option<Completion>>> = Rc::new(RefCell::new(None));

    let completion = runtime.scheduler().next_update();
    let task_runtime = runtime.clone();
    let task_tally = tally.clone();
    let slot = inner_completion.clone();
    runtime.scheduler().update_document(Box::new(move || -> Result<()> {
        task_tally.with_mut(|t: &mut Tally| t.value = 9);
        *slot.borrow_mut() = Some(task_runtime.update(&task_tally)?);
        Ok(())
    }));

    runtime.perform_updates().unwrap();

    assert_eq!(platform.text_content(tally.element().unwrap()), "9");
    assert_eq!(tally.with(|t: &Tally| t.renders.get()), Some(2));
    assert!(completion.now_or_never().is_some());
    let inner = inner_completion.borrow_mut().take().unwrap();
    assert!(inner.now_or_never().is_some());
}

/// Test the runtime with a scheduler flushing on a local tokio task.
#[tokio::test]
async fn task_scheduler_flushes_without_a_frame() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let (platform, runtime) = setup();
            runtime.set_scheduler(TaskScheduler::new());
            let tally = runtime.mount(Tally::new()).unwrap();

            tally.with_mut(|t: &mut Tally| t.value = 3).unwrap();
            runtime.update(&tally).unwrap().await;
            assert_eq!(platform.text_content(tally.element().unwrap()), "3");
        })
        .await;
}

/// Test that an update still queued for a destroyed component is skipped.
#[test]
fn destruction_preempts_pending_updates() {
    let (_platform, runtime) = setup();
    let tally = runtime.mount(Tally::new()).unwrap();

    runtime.update(&tally).unwrap();
    runtime.destroy_sync(&tally);
    runtime.perform_updates().unwrap();

    assert!(tally.is_destroyed());
    assert_eq!(tally.with(|t: &Tally| t.renders.get()), Some(1));
}
