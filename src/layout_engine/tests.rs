use pretty_assertions::assert_eq;

use crate::commands::parse_command;
use crate::common::config::Config;
use crate::layout_engine::{
    ContainerKind, Direction, Layout, NodeSnapshot, OutputId, OutputInfo, SeatId,
    SurfaceInfo, WindowManager,
};
use crate::model::tree::NodeId;
use crate::sys::compositor::Layer;
use crate::sys::compositor::recording::{Effect, Recorder};
use crate::sys::geometry::{Point, Rect};

use Effect::*;

fn screen() -> Rect { Rect::new(0, 0, 1920, 1080) }

struct Fixture {
    wm: WindowManager<Recorder>,
    seat: SeatId,
    outputs: Vec<OutputId>,
}

impl Fixture {
    fn new(layout: Layout) -> Self { Self::with_outputs(layout, &[("main", screen())]) }

    fn with_outputs(layout: Layout, outputs: &[(&str, Rect)]) -> Self {
        let mut config = Config::parse("").unwrap();
        config.settings.default_layout = layout;
        Self::with_config(&config, outputs)
    }

    fn with_config(config: &Config, outputs: &[(&str, Rect)]) -> Self {
        let mut wm = WindowManager::new(Recorder::default(), config);
        let seat = wm.add_seat("seat0");
        let outputs = outputs
            .iter()
            .map(|&(name, geometry)| {
                wm.add_output(OutputInfo { name: name.into(), geometry, scale: 1 })
            })
            .collect();
        wm.compositor_mut().take();
        let fixture = Fixture { wm, seat, outputs };
        fixture.check();
        fixture
    }

    fn add(&mut self, app_id: &str) -> NodeId {
        let info = SurfaceInfo {
            app_id: Some(app_id.into()),
            geometry: Rect::default(),
        };
        let node = self.wm.surface_added(info).expect("an output exists");
        self.check();
        node
    }

    fn remove(&mut self, surface: NodeId) {
        self.wm.surface_removed(surface);
        self.check();
    }

    fn run(&mut self, command: &str) {
        let command = parse_command(command).unwrap();
        self.wm.invoke(&command, self.seat);
        self.check();
    }

    fn effects(&mut self) -> Vec<Effect> { self.wm.compositor_mut().take() }

    fn geometry(&self, node: NodeId) -> Rect { self.wm.container(node).unwrap().geometry }

    fn visible(&self, node: NodeId) -> bool { self.wm.container(node).unwrap().visible }

    fn workspace(&self, name: &str) -> NodeId { self.wm.workspaces().by_name(name).unwrap() }

    fn parent(&self, node: NodeId) -> Option<NodeId> { node.parent(&self.wm.tree.map) }

    fn children(&self, node: NodeId) -> Vec<NodeId> { node.children(&self.wm.tree.map).collect() }

    fn check(&self) {
        let wm = &self.wm;
        let map = &wm.tree.map;
        for (node, container) in &wm.tree.data.containers {
            match &container.kind {
                ContainerKind::Surface(_) => {
                    assert!(wm.is_workspace(node.root(map)), "{node:?} is not under a workspace");
                    assert!(node.is_empty(map), "surface {node:?} has children");
                }
                ContainerKind::Group { .. } => {
                    assert!(!node.is_empty(map), "empty container {node:?} was kept");
                    assert!(node.parent(map).is_some(), "container {node:?} is a root");
                }
                ContainerKind::Workspace(ws) => {
                    assert_eq!(None, node.parent(map), "workspace {node:?} has a parent");
                    assert_eq!(Some(node), wm.workspaces().by_name(&ws.name));
                }
            }
        }
        let mut reached = 0;
        for workspace in wm.workspaces().sorted() {
            for node in workspace.traverse_preorder(map) {
                assert!(wm.container(node).is_some(), "{node:?} has no container");
                let forward: Vec<NodeId> = node.children(map).collect();
                let mut backward: Vec<NodeId> = node.children_rev(map).collect();
                backward.reverse();
                assert_eq!(forward, backward, "sibling links of {node:?} disagree");
                reached += 1;
            }
        }
        assert_eq!(map.len(), reached, "a node is outside every workspace");

        let path: Vec<NodeId> =
            wm.current().map(|c| c.ancestors(map).collect()).unwrap_or_default();
        for (node, container) in &wm.tree.data.containers {
            if container.is_current {
                assert!(path.contains(&node), "{node:?} is marked current off the current path");
            }
        }
        // Without an output nothing is current.
        if let Some(&workspace) = path.last()
            && wm.output_of(workspace).is_some()
        {
            for &node in &path {
                assert!(
                    wm.container(node).is_some_and(|c| c.is_current),
                    "{node:?} is on the current path but not marked current"
                );
            }
        }
        if let Some(focus) = wm.focus() {
            assert_eq!(Some(focus), wm.current(), "focus is not on the current surface");
        }
    }
}

#[test]
fn first_surface_takes_focus() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let seat = f.seat;
    let a = f.add("a");
    assert_eq!(
        vec![
            Resize(a, 1920, 1080),
            Map(a, Layer::Normal),
            KeyboardFocus(seat, Some(a)),
            Activate(a, true),
            Map(a, Layer::Normal),
        ],
        f.effects()
    );
    assert_eq!(Some(a), f.wm.focus());

    let b = f.add("b");
    assert_eq!(Some(a), f.wm.focus(), "a new surface does not steal focus");
    assert_eq!(
        vec![
            Resize(a, 960, 1080),
            Resize(b, 960, 1080),
            Map(a, Layer::Normal),
            Map(b, Layer::Normal),
        ],
        f.effects()
    );
}

#[test]
fn split_divides_width_evenly() {
    let mut f = Fixture::with_outputs(Layout::SplitHorizontal, &[("main", Rect::new(0, 0, 1000, 600))]);
    let a = f.add("a");
    let b = f.add("b");
    let c = f.add("c");
    assert_eq!(Rect::new(0, 0, 333, 600), f.geometry(a));
    assert_eq!(Rect::new(333, 0, 333, 600), f.geometry(b));
    assert_eq!(Rect::new(666, 0, 333, 600), f.geometry(c));
    let total: i32 = [a, b, c].iter().map(|&n| f.geometry(n).width).sum();
    assert!(total <= 1000);

    f.run("layout split vertical");
    assert_eq!(Rect::new(0, 200, 1000, 200), f.geometry(b));
}

#[test]
fn focus_directions_are_reversible() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    let b = f.add("b");
    let c = f.add("c");

    f.run("focus right");
    assert_eq!(Some(b), f.wm.focus());
    f.run("focus left");
    assert_eq!(Some(a), f.wm.focus());

    f.run("focus right");
    f.run("focus right");
    assert_eq!(Some(c), f.wm.focus());
    f.run("focus left");
    f.run("focus left");
    assert_eq!(Some(a), f.wm.focus());
}

#[test]
fn focus_wraps_within_the_workspace() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    let _b = f.add("b");
    let c = f.add("c");

    f.run("focus left");
    assert_eq!(Some(c), f.wm.focus());
    f.run("focus right");
    assert_eq!(Some(a), f.wm.focus());
}

#[test]
fn focus_across_the_axis_is_a_no_op() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    let _b = f.add("b");
    f.effects();

    f.run("focus top");
    f.run("focus bottom");
    assert_eq!(Vec::<Effect>::new(), f.effects());
    assert_eq!(Some(a), f.wm.current());
}

#[test]
fn focus_parent_and_child() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let seat = f.seat;
    let a = f.add("a");
    let _b = f.add("b");
    let ws = f.workspace("0");
    f.effects();

    f.run("focus parent");
    assert_eq!(Some(ws), f.wm.current());
    assert_eq!(None, f.wm.focus());
    assert_eq!(vec![Activate(a, false), KeyboardFocus(seat, None)], f.effects());

    f.run("focus parent");
    assert_eq!(Vec::<Effect>::new(), f.effects());

    f.run("focus child");
    assert_eq!(Some(a), f.wm.focus());
}

#[test]
fn tabbed_focus_shows_the_recency_head() {
    let mut f = Fixture::new(Layout::TabbedHorizontal);
    let seat = f.seat;
    let a = f.add("a");
    let b = f.add("b");
    assert!(f.visible(a));
    assert!(!f.visible(b));
    f.effects();

    f.run("focus right");
    assert_eq!(
        vec![
            Unmap(a),
            Map(b, Layer::Normal),
            Activate(a, false),
            KeyboardFocus(seat, Some(b)),
            Activate(b, true),
            Map(b, Layer::Normal),
        ],
        f.effects()
    );
    assert!(!f.visible(a));
    assert!(f.visible(b));
}

#[test_log::test]
fn closing_the_focused_surface_refocuses() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let seat = f.seat;
    f.run(r#"focus workspace "code""#);
    let code = f.workspace("code");
    assert_eq!(None, f.wm.workspaces().by_name("0"), "hidden empty workspace is reclaimed");

    let a = f.add("a");
    let b = f.add("b");
    f.run("focus right");
    assert_eq!(Some(b), f.wm.focus());
    f.effects();

    f.run("close");
    assert_eq!(vec![Close(b)], f.effects());

    f.remove(b);
    assert_eq!(
        vec![
            Activate(b, false),
            KeyboardFocus(seat, None),
            Resize(a, 1920, 1080),
            Unmap(b),
            KeyboardFocus(seat, Some(a)),
            Activate(a, true),
            Map(a, Layer::Normal),
        ],
        f.effects()
    );
    assert_eq!(Rect::new(0, 0, 1920, 1080), f.geometry(a));
    assert_eq!(Some(a), f.wm.focus());
    assert_eq!(vec![a], f.children(code));
}

#[test]
fn closing_without_focus_does_nothing() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    f.run("close");
    f.run("fullscreen toggle");
    assert_eq!(Vec::<Effect>::new(), f.effects());
}

#[test]
fn layout_toggle_twice() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    let b = f.add("b");
    let ws = f.workspace("0");
    f.effects();

    f.run("layout tabbed toggle");
    assert_eq!(Some(Layout::TabbedHorizontal), f.wm.layout_of(ws));
    assert_eq!(
        vec![Resize(a, 1920, 1080), Resize(b, 1920, 1080), Map(a, Layer::Normal), Unmap(b)],
        f.effects()
    );
    assert!(f.visible(a));
    assert!(!f.visible(b));

    f.run("layout tabbed toggle");
    assert_eq!(Some(Layout::TabbedVertical), f.wm.layout_of(ws));
    assert!(!f.visible(b));
    f.effects();

    f.run("layout tabbed vertical");
    assert_eq!(Vec::<Effect>::new(), f.effects());

    f.run("layout split");
    assert_eq!(Some(Layout::SplitHorizontal), f.wm.layout_of(ws));
    assert!(f.visible(b));
}

#[test]
fn parsed_command_matches_direct_call() {
    let build = || {
        let mut f = Fixture::new(Layout::SplitHorizontal);
        f.add("a");
        f.add("b");
        f.effects();
        f
    };
    let mut direct = build();
    let seat = direct.seat;
    direct.wm.focus_direction(seat, Direction::Left);

    let mut parsed = build();
    parsed.run("focus left");

    assert_eq!(direct.effects(), parsed.effects());
    assert_eq!(direct.wm.snapshot(), parsed.wm.snapshot());
}

#[test]
fn anonymous_workspace_takes_first_gap() {
    let mut f = Fixture::with_outputs(
        Layout::SplitHorizontal,
        &[("left", Rect::new(0, 0, 1000, 800))],
    );
    for number in ["3", "7", "5"] {
        f.run(&format!("focus workspace {number}"));
        f.add(number);
    }
    assert_eq!(None, f.wm.workspaces().by_name("0"));

    let right = f.wm.add_output(OutputInfo {
        name: "right".into(),
        geometry: Rect::new(1000, 0, 1000, 800),
        scale: 1,
    });
    f.check();
    let fresh = f.workspace("0");
    assert_eq!(Some(right), f.wm.output_of(fresh));
    assert_eq!(Some(fresh), f.wm.workspaces().by_number(0));
    assert_eq!(Some(f.workspace("5")), f.wm.workspaces().focused(), "new output does not take focus");
}

#[test]
fn workspace_focus_by_name_and_back_and_forth() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    let ws0 = f.workspace("0");

    f.run(r#"focus workspace "web""#);
    let web = f.workspace("web");
    assert_eq!(Some(web), f.wm.workspaces().focused());
    assert_eq!(None, f.wm.focus());
    assert!(!f.visible(a));

    f.run(r#"focus workspace "web""#);
    assert_eq!(Some(ws0), f.wm.workspaces().focused());
    assert_eq!(Some(a), f.wm.focus());
    assert_eq!(None, f.wm.workspaces().by_name("web"));
}

#[test]
fn workspace_next_and_previous() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    f.run("focus workspace 1");
    let b = f.add("b");
    f.run("focus workspace 2");
    let c = f.add("c");

    f.run("focus workspace previous");
    assert_eq!(Some(b), f.wm.focus());
    f.run("focus workspace previous");
    assert_eq!(Some(a), f.wm.focus());
    f.run("focus workspace previous");
    assert_eq!(Some(a), f.wm.focus());
    f.run("focus workspace next");
    f.run("focus workspace next");
    assert_eq!(Some(c), f.wm.focus());
}

#[test]
fn move_swaps_with_sibling() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    let b = f.add("b");
    let c = f.add("c");
    let ws = f.workspace("0");

    f.run("move right");
    assert_eq!(vec![b, a, c], f.children(ws));
    assert_eq!(Rect::new(640, 0, 640, 1080), f.geometry(a));
    assert_eq!(Some(a), f.wm.focus());

    f.run("move left");
    f.run("move left");
    assert_eq!(vec![a, b, c], f.children(ws));
}

#[test]
fn move_across_axis_wraps_then_nests() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    let b = f.add("b");
    let ws = f.workspace("0");

    f.run("move bottom");
    let group = f.parent(b).unwrap();
    assert_ne!(ws, group);
    assert_eq!(vec![group, a], f.children(ws));
    assert_eq!(Some(Layout::SplitVertical), f.wm.layout_of(ws));
    assert_eq!(Some(Layout::SplitHorizontal), f.wm.layout_of(group));
    assert_eq!(Rect::new(0, 0, 1920, 540), f.geometry(b));
    assert_eq!(Rect::new(0, 540, 1920, 540), f.geometry(a));
    assert_eq!(Some(a), f.wm.focus());

    f.run("move top");
    assert_eq!(Some(group), f.parent(a));
    assert_eq!(vec![b, a], f.children(group));
    assert_eq!(Rect::new(960, 0, 960, 1080), f.geometry(a));

    f.run("move parent");
    assert_eq!(Some(ws), f.parent(a));
    assert_eq!(vec![group, a], f.children(ws));
    f.effects();

    f.run("move parent");
    f.run("move child");
    assert_eq!(Vec::<Effect>::new(), f.effects());
}

#[test]
fn moving_a_lone_surface_does_nothing() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    let ws = f.workspace("0");
    f.effects();

    for direction in ["top", "bottom", "left", "right"] {
        f.run(&format!("move {direction}"));
    }
    assert_eq!(Vec::<Effect>::new(), f.effects());
    assert_eq!(Some(Layout::SplitHorizontal), f.wm.layout_of(ws));
    assert_eq!(vec![a], f.children(ws));
    assert_eq!(Some(a), f.wm.focus());
}

#[test]
fn lifting_the_last_child_frees_the_group() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    let b = f.add("b");
    let ws = f.workspace("0");

    f.run("move bottom");
    let group = f.parent(b).unwrap();
    f.run("focus top");
    assert_eq!(Some(group), f.wm.current());
    assert_eq!(None, f.wm.focus());
    f.run("focus child");
    assert_eq!(Some(b), f.wm.focus());
    f.run("move parent");
    assert_eq!(None, f.wm.container(group), "empty container is released");
    assert_eq!(vec![b, a], f.children(ws));
}

#[test]
fn move_to_workspace_keeps_focus_in_source() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    let b = f.add("b");
    let ws0 = f.workspace("0");

    f.run("move workspace 2");
    let ws2 = f.workspace("2");
    assert_eq!(ws2, f.wm.workspace_of(a));
    assert!(!f.visible(a));
    assert_eq!(Some(b), f.wm.focus());
    assert_eq!(Rect::new(0, 0, 1920, 1080), f.geometry(b));
    assert_eq!(Some(ws0), f.wm.workspaces().focused());

    f.run("focus workspace 2");
    assert_eq!(Some(a), f.wm.focus());
    assert!(f.visible(a));
    assert!(!f.visible(b));

    f.effects();
    f.run("move workspace 2");
    assert_eq!(Vec::<Effect>::new(), f.effects());

    f.run("focus workspace back-and-forth");
    assert_eq!(Some(b), f.wm.focus());
}

#[test]
fn move_to_named_workspace_nests_beside_recent_surface() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    let b = f.add("b");
    f.run(r#"move workspace "mail""#);
    let mail = f.workspace("mail");
    f.run(r#"focus workspace "mail""#);
    assert_eq!(Some(a), f.wm.focus());
    f.run("focus workspace back-and-forth");
    assert_eq!(Some(b), f.wm.focus());
    f.run(r#"move workspace "mail""#);
    assert_eq!(vec![a, b], f.children(mail));
    assert_eq!(None, f.wm.focus());
}

fn two_outputs() -> Fixture {
    Fixture::with_outputs(
        Layout::SplitHorizontal,
        &[("left", Rect::new(0, 0, 1000, 800)), ("right", Rect::new(1000, 0, 1000, 800))],
    )
}

#[test]
fn focus_crosses_outputs() {
    let mut f = two_outputs();
    let [left, right] = [f.outputs[0], f.outputs[1]];
    let ws0 = f.workspace("0");
    let ws1 = f.workspace("1");
    assert_eq!(Some(left), f.wm.output_of(ws0));
    assert_eq!(Some(right), f.wm.output_of(ws1));
    assert_eq!(Some(ws0), f.wm.workspaces().focused());

    let a = f.add("a");
    f.run("focus output right");
    assert_eq!(Some(ws1), f.wm.workspaces().focused());
    assert_eq!(None, f.wm.focus());

    let b = f.add("b");
    assert_eq!(Some(b), f.wm.focus());
    f.run("focus left");
    assert_eq!(Some(a), f.wm.focus());
    assert_eq!(Some(ws0), f.wm.workspaces().focused());
    f.run("focus right");
    assert_eq!(Some(b), f.wm.focus());

    f.run(r#"focus output "left""#);
    assert_eq!(Some(a), f.wm.focus());
}

#[test]
fn move_crosses_outputs_and_removal_migrates() {
    let mut f = two_outputs();
    let [left, right] = [f.outputs[0], f.outputs[1]];
    let seat = f.seat;
    let a = f.add("a");
    f.run("focus output right");
    let b = f.add("b");
    f.run("focus left");
    let ws0 = f.workspace("0");
    let ws1 = f.workspace("1");

    f.run("move right");
    assert_eq!(ws1, f.wm.workspace_of(a));
    assert_eq!(Some(ws1), f.wm.workspaces().focused());
    assert_eq!(Rect::new(1500, 0, 500, 800), f.geometry(a));
    assert_eq!(Some(a), f.wm.focus());
    assert_eq!(Some(ws0), f.wm.workspaces().by_name("0"), "visible empty workspace is kept");
    f.effects();

    f.wm.remove_output(right);
    f.check();
    assert_eq!(
        vec![
            Unmap(b),
            Unmap(a),
            Resize(b, 500, 800),
            Resize(a, 500, 800),
            Activate(a, false),
            KeyboardFocus(seat, None),
        ],
        f.effects()
    );
    assert_eq!(Some(left), f.wm.output_of(ws1));
    assert!(!f.visible(ws1));
    assert_eq!(Some(ws0), f.wm.workspaces().focused());

    f.run("focus workspace 1");
    assert_eq!(None, f.wm.workspaces().by_name("0"));
    assert_eq!(Some(a), f.wm.focus());
    assert_eq!(Rect::new(500, 0, 500, 800), f.geometry(a));
}

#[test]
fn removing_the_last_output_orphans_workspaces() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    let ws0 = f.workspace("0");
    let main = f.outputs[0];

    f.wm.remove_output(main);
    f.check();
    assert_eq!(None, f.wm.focus());
    assert_eq!(None, f.wm.output_of(ws0));
    assert!(!f.visible(a));
    let info = SurfaceInfo { app_id: None, geometry: Rect::default() };
    assert_eq!(None, f.wm.surface_added(info));

    let next = f.wm.add_output(OutputInfo {
        name: "next".into(),
        geometry: Rect::new(0, 0, 800, 600),
        scale: 1,
    });
    f.check();
    assert_eq!(Some(next), f.wm.output_of(ws0));
    assert_eq!(Some(a), f.wm.focus());
    assert!(f.visible(a));
    assert_eq!(Rect::new(0, 0, 800, 600), f.geometry(a));
}

#[test]
fn readopted_empty_workspace_is_current() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let ws0 = f.workspace("0");
    f.wm.remove_output(f.outputs[0]);
    f.check();

    f.wm.add_output(OutputInfo { name: "next".into(), geometry: screen(), scale: 1 });
    f.check();
    assert_eq!(Some(ws0), f.wm.current());
    assert!(f.wm.container(ws0).unwrap().is_current);
    let a = f.add("a");
    assert_eq!(Some(a), f.wm.focus());
}

#[test]
fn move_workspace_to_output() {
    let mut f = two_outputs();
    let [left, right] = [f.outputs[0], f.outputs[1]];
    let a = f.add("a");
    let ws0 = f.workspace("0");

    f.run("move output right");
    assert_eq!(Some(right), f.wm.output_of(ws0));
    assert_eq!(Some(ws0), f.wm.workspaces().focused());
    assert_eq!(Some(a), f.wm.focus());
    assert_eq!(Rect::new(1000, 0, 1000, 800), f.geometry(a));
    assert_eq!(None, f.wm.workspaces().by_name("1"), "replaced empty workspace is reclaimed");
    let fallback = f.workspace("2");
    assert_eq!(Some(fallback), f.wm.outputs().get(left).and_then(|o| o.current));
}

#[test]
fn output_geometry_change_resizes_workspaces() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    let b = f.add("b");
    let main = f.outputs[0];
    f.wm.output_geometry_changed(main, Rect::new(0, 0, 1280, 720), 2);
    assert_eq!(Rect::new(0, 0, 640, 720), f.geometry(a));
    assert_eq!(Rect::new(640, 0, 640, 720), f.geometry(b));
    assert_eq!(2, f.wm.outputs().get(main).unwrap().scale);
}

#[test]
fn fullscreen_round_trip() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    let _b = f.add("b");
    f.effects();

    f.run("fullscreen toggle");
    assert_eq!(
        vec![Resize(a, 1920, 1080), Fullscreen(a, true), Map(a, Layer::Fullscreen)],
        f.effects()
    );
    f.run("fullscreen enable");
    assert_eq!(Vec::<Effect>::new(), f.effects());

    f.wm.surface_committed(a, Rect::new(4, 4, 1920, 1080));
    assert_eq!(vec![Position(a, Point::new(-4, -4))], f.effects());

    f.wm.surface_fullscreen_requested(a, false);
    assert_eq!(
        vec![Fullscreen(a, false), Resize(a, 960, 1080), Map(a, Layer::Normal)],
        f.effects()
    );
}

#[test]
fn commit_positions_the_view() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let _a = f.add("a");
    let b = f.add("b");
    f.effects();

    f.wm.surface_committed(b, Rect::new(10, 5, 960, 1080));
    assert_eq!(vec![Position(b, Point::new(950, -5))], f.effects());

    f.wm.surface_committed(b, Rect::new(0, 0, 800, 600));
    assert_eq!(vec![Resize(b, 960, 1080), Position(b, Point::new(960, 0))], f.effects());
}

#[test]
fn assigned_surfaces_go_to_their_workspace() {
    let config = Config::parse(
        r#"
        [settings]
        default_layout = "split_horizontal"

        [[assign]]
        app_id = "firefox"
        workspace = "web"

        [[assign]]
        app_id_regex = "^mpv$"
        workspace = 4
        "#,
    )
    .unwrap();
    let mut f = Fixture::with_config(&config, &[("main", screen())]);

    let firefox = f.add("firefox");
    let web = f.workspace("web");
    assert_eq!(web, f.wm.workspace_of(firefox));
    assert!(!f.visible(firefox));
    assert_eq!(None, f.wm.focus());
    assert_eq!(vec![Resize(firefox, 1920, 1080)], f.effects());

    let mpv = f.add("mpv");
    assert_eq!(f.workspace("4"), f.wm.workspace_of(mpv));

    let foot = f.add("foot");
    assert_eq!(f.workspace("0"), f.wm.workspace_of(foot));
    assert_eq!(Some(foot), f.wm.focus());
}

#[test]
fn bindings_run_actions() {
    let config = Config::parse(
        r#"
        [keys]
        "super+return" = { exec = "foot --title term" }
        "super+shift+e" = "quit"
        "#,
    )
    .unwrap();
    let mut f = Fixture::with_config(&config, &[("main", screen())]);
    let seat = f.seat;
    for trigger in ["super+return", "super+shift+e"] {
        let action = config.key(&trigger.parse().unwrap()).unwrap();
        f.wm.run_action(action, seat);
    }
    assert_eq!(
        vec![Spawn(vec!["foot".into(), "--title".into(), "term".into()]), Quit],
        f.effects()
    );
}

#[test]
fn seats_follow_focus() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    f.effects();
    let second = f.wm.add_seat("seat1");
    assert_eq!(vec![KeyboardFocus(second, Some(a))], f.effects());
    f.wm.remove_seat(second);
    let b = f.add("b");
    f.run("focus right");
    let keyboard: Vec<Effect> =
        f.effects().into_iter().filter(|e| matches!(e, KeyboardFocus(..))).collect();
    assert_eq!(vec![KeyboardFocus(f.seat, Some(b))], keyboard);
}

#[test]
fn snapshot_and_tree() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    let b = f.add("b");
    f.run("move bottom");
    let group = f.parent(b).unwrap();
    let snapshot = f.wm.snapshot();
    assert_eq!(Some(a), snapshot.focus);
    assert_eq!(Some("0".to_owned()), snapshot.focused_workspace);
    assert_eq!(1, snapshot.outputs.len());
    assert_eq!(Some("0".to_owned()), snapshot.outputs[0].workspace);

    let ws = &snapshot.workspaces[0];
    assert_eq!(Some("main".to_owned()), ws.output);
    let ids: Vec<NodeId> = ws.children.iter().map(|c| c.state().id).collect();
    assert_eq!(f.children(f.workspace("0")), ids);
    assert_eq!(vec![group, a], ids);
    let NodeSnapshot::Group { children, .. } = &ws.children[0] else {
        panic!("expected a group, got {:?}", ws.children[0]);
    };
    assert_eq!(vec![b], children.iter().map(|c| c.state().id).collect::<Vec<_>>());
    assert!(matches!(&ws.children[1], NodeSnapshot::Surface { fullscreen: false, .. }));

    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"app_id\":\"a\""));

    let tree = f.wm.draw_tree();
    assert!(tree.contains("workspace \"0\""), "{tree}");
    assert!(tree.contains("☒"), "{tree}");
}

#[test]
fn removing_unknown_surface_is_ignored() {
    let mut f = Fixture::new(Layout::SplitHorizontal);
    let a = f.add("a");
    f.remove(a);
    f.effects();
    f.remove(a);
    assert_eq!(Vec::<Effect>::new(), f.effects());
    assert_eq!(Some(f.workspace("0")), f.wm.current());
}

#[test]
fn layout_switch_targets_the_surface_parent() {
    let mut f = Fixture::new(Layout::TabbedHorizontal);
    let _a = f.add("a");
    let ws = f.workspace("0");
    f.run("layout split vertical");
    assert_eq!(Some(Layout::SplitVertical), f.wm.layout_of(ws));
    f.run("layout tabbed");
    assert_eq!(Some(Layout::TabbedHorizontal), f.wm.layout_of(ws));
}

mod random {
    use proptest::prelude::*;

    use super::*;

    const APPS: &[&str] = &["foot", "mail", "mpv"];

    const COMMANDS: &[&str] = &[
        "focus left",
        "focus right",
        "focus top",
        "focus bottom",
        "focus parent",
        "focus child",
        "move left",
        "move right",
        "move top",
        "move bottom",
        "move parent",
        "layout tabbed",
        "layout split",
        "layout split toggle",
        "layout tabbed vertical",
        "fullscreen toggle",
        "focus workspace next",
        "focus workspace previous",
        "focus workspace back-and-forth",
        "focus workspace 1",
        "focus workspace 2",
        r#"focus workspace "mail""#,
        "move workspace next",
        "move workspace 1",
        r#"move workspace "mail""#,
        "focus output left",
        "focus output right",
        "move output left",
        "move output right",
    ];

    #[derive(Clone, Debug)]
    enum Step {
        Add(&'static str),
        Remove(prop::sample::Index),
        Run(&'static str),
        AddOutput,
        RemoveOutput(prop::sample::Index),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            4 => prop::sample::select(APPS).prop_map(Step::Add),
            2 => any::<prop::sample::Index>().prop_map(Step::Remove),
            8 => prop::sample::select(COMMANDS).prop_map(Step::Run),
            1 => Just(Step::AddOutput),
            1 => any::<prop::sample::Index>().prop_map(Step::RemoveOutput),
        ]
    }

    fn layout() -> impl Strategy<Value = Layout> {
        prop::sample::select(vec![
            Layout::TabbedHorizontal,
            Layout::TabbedVertical,
            Layout::SplitHorizontal,
            Layout::SplitVertical,
        ])
    }

    fn fixture(layout: Layout) -> Fixture {
        let mut config = Config::parse(
            r#"
            [[assign]]
            app_id = "mail"
            workspace = "mail"
            "#,
        )
        .unwrap();
        config.settings.default_layout = layout;
        Fixture::with_config(&config, &[("main", screen())])
    }

    proptest! {
        #[test]
        fn random_steps_keep_the_tree_consistent(
            layout in layout(),
            steps in prop::collection::vec(step(), 1..60),
        ) {
            let mut f = fixture(layout);
            let mut surfaces: Vec<NodeId> = Vec::new();
            let mut added_outputs = 0;
            for step in steps {
                match step {
                    Step::Add(app_id) => {
                        let info =
                            SurfaceInfo { app_id: Some(app_id.into()), geometry: Rect::default() };
                        let node = f.wm.surface_added(info);
                        prop_assert_eq!(f.outputs.is_empty(), node.is_none());
                        surfaces.extend(node);
                        f.check();
                    }
                    Step::Remove(index) => {
                        if !surfaces.is_empty() {
                            let surface = surfaces.remove(index.index(surfaces.len()));
                            f.remove(surface);
                            prop_assert!(f.wm.container(surface).is_none());
                        }
                    }
                    Step::Run(command) => f.run(command),
                    Step::AddOutput => {
                        added_outputs += 1;
                        let geometry = Rect::new(1920 * added_outputs, 0, 1280, 720);
                        let name = format!("extra-{added_outputs}");
                        let output = f.wm.add_output(OutputInfo { name, geometry, scale: 1 });
                        f.outputs.push(output);
                        f.check();
                    }
                    Step::RemoveOutput(index) => {
                        if !f.outputs.is_empty() {
                            let output = f.outputs.remove(index.index(f.outputs.len()));
                            f.wm.remove_output(output);
                            f.check();
                        }
                    }
                }
                for &surface in &surfaces {
                    prop_assert!(f.wm.is_surface(surface), "{:?} was dropped", surface);
                }
            }
        }
    }
}
