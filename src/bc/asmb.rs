// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::binrw;
use tracing::trace;

use crate::bc::BcArray;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::pointer::Pointer64;

pub const ASMB_MAGIC: [u8; 4] = *b"ASMB";

/// Size of the fields every state starts with. Kind-specific fields follow.
const STATE_BASE_SIZE: usize = 104;
/// Name and kind of a transition, padded to pointer alignment.
const TRANSITION_BASE_SIZE: usize = 16;
const BLEND_BASE_SIZE: usize = 8;

#[binrw]
#[derive(Debug)]
struct RawHeader {
    unk: u32,
    id: [u8; 4],
    assembly: Pointer64<RawAssembly>,
}

#[binrw]
#[derive(Debug)]
struct RawAssembly {
    unk: u32,
    padding: u32,
    group_folders: BcArray<Pointer64<u8>>,
    states: BcArray<Pointer64<u8>>,
    var_params: BcArray<RawVarParam>,
    animations: BcArray<RawAnimationResource>,
    null00: u64,
    key_values: BcArray<RawKeyValue>,
}

#[binrw]
#[derive(Debug)]
struct RawVarParam {
    kind: u32,
    padding: u32,
    name: Pointer64<u8>,
}

#[binrw]
#[derive(Debug)]
struct RawUsedInState {
    index: u32,
    unk1: u32,
}

#[binrw]
#[derive(Debug)]
struct RawAnimationResource {
    path: Pointer64<u8>,
    used_in_states: BcArray<RawUsedInState>,
}

#[binrw]
#[derive(Debug)]
struct RawKeyValue {
    key: Pointer64<u8>,
    value: Pointer64<u8>,
}

#[binrw]
#[derive(Debug)]
struct RawStateEvent {
    name: Pointer64<u8>,
    unk: u32,
    padding: u32,
    value: Pointer64<u8>,
}

#[binrw]
#[derive(Debug)]
struct RawTimedEvent {
    trigger_frame: f32,
    padding: u32,
    event: RawStateEvent,
}

#[binrw]
#[derive(Debug)]
struct RawFallback {
    name: Pointer64<u8>,
    unk00: [u32; 2],
    unk01: u32,
    null00: [u32; 2],
    unk02: f32,
    unk03: u32,
    unk04: u32,
}

#[binrw]
#[derive(Debug)]
struct RawStateBase {
    kind: u32,
    padding0: u32,
    name: Pointer64<u8>,
    unk0: [u32; 3],
    padding1: u32,
    transitions: BcArray<Pointer64<u8>>,
    fallback: Pointer64<RawFallback>,
    enter_events: BcArray<RawStateEvent>,
    exit_events: BcArray<RawStateEvent>,
    events: BcArray<RawTimedEvent>,
}

#[binrw]
#[derive(Debug)]
struct RawAnimRef {
    path: Pointer64<u8>,
    group_folder: u32,
    mirrored: u32,
    unk02: f32,
    unk03: f32,
    null00: u32,
    unk04: f32,
}

#[binrw]
#[derive(Debug)]
struct RawExitAnim {
    path: Pointer64<u8>,
    group_folder: u32,
    unk01: u32,
    null00: u32,
    unk03: f32,
    unk04: f32,
    unk05: f32,
}

#[binrw]
#[derive(Debug)]
struct RawBlend {
    kind: u32,
    var_param: u32,
}

#[binrw]
#[derive(Debug)]
struct RawBlendAnim {
    trigger_value: f32,
    padding: u32,
    anim: RawAnimRef,
}

#[binrw]
#[derive(Debug)]
struct RawTransition {
    name: Pointer64<u8>,
    kind: u32,
    padding: u32,
}

#[binrw]
#[derive(Debug)]
struct RawTarget {
    state: Pointer64<u8>,
    unk00: [f32; 6],
    unk01: [u32; 2],
}

#[binrw]
#[derive(Debug)]
struct RawSpan {
    name: Pointer64<u8>,
    null00: u32,
    padding: u32,
    target: Pointer64<u8>,
    begin: f32,
    end: f32,
    unk01: u32,
    null01: [u32; 2],
    unk02: f32,
    unk03: u32,
    unk04: u32,
}

#[binrw]
#[derive(Debug)]
struct RawSwitch {
    var_param: u32,
    padding: u32,
    cases: BcArray<RawCase>,
}

#[binrw]
#[derive(Debug)]
struct RawCase {
    value: u32,
    padding: u32,
    target: RawTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarParamType {
    Int,
    Float,
}

/// A named input driving transitions and blends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarParam {
    pub name: String,
    pub kind: VarParamType,
}

/// An animation file and the states playing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationResource {
    pub path: String,
    pub used_in_states: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// An event raised on entering or leaving a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEvent {
    pub name: String,
    pub value: Option<String>,
}

/// An event raised at a frame of a state's animation.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub trigger_frame: f32,
    pub event: StateEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fallback {
    pub name: String,
    pub unk00: [u32; 2],
    pub unk01: u32,
    pub unk02: f32,
    pub unk03: u32,
    pub unk04: u32,
}

/// An animation played by a state or a blend.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimRef {
    pub path: String,
    /// Index into [`StateMachine::group_folders`].
    pub group_folder: u32,
    pub mirrored: bool,
    pub unk02: f32,
    pub unk03: f32,
    pub unk04: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlendAnim {
    pub trigger_value: f32,
    pub anim: AnimRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlendKind {
    OneDimensional,
    /// Blends layered over one base animation.
    OneDimensionalBasis { base: AnimRef },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Blend {
    pub kind: BlendKind,
    /// Index into [`StateMachine::var_params`].
    pub var_param: u32,
    pub blends: Vec<BlendAnim>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitAnim {
    pub path: String,
    pub group_folder: u32,
    pub unk01: u32,
    pub unk03: f32,
    pub unk04: f32,
    pub unk05: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateKind {
    Animation(AnimRef),
    ExitAnim(ExitAnim),
    Blend(Blend),
}

/// Where a transition leads.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub state: String,
    pub unk00: [f32; 6],
    pub unk01: [u32; 2],
}

/// A transition allowed between two points of the source animation.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub name: String,
    pub target: String,
    pub begin: f32,
    pub end: f32,
    pub unk01: u32,
    pub unk02: f32,
    pub unk03: u32,
    pub unk04: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub value: u32,
    pub target: Target,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionKind {
    Basic(Target),
    Spans(Vec<Span>),
    /// Picks a case by the value of a var param.
    Switch {
        var_param: u32,
        cases: Vec<Case>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub name: String,
    pub kind: TransitionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub name: String,
    pub unk0: [u32; 3],
    pub kind: StateKind,
    pub transitions: Vec<Transition>,
    pub fallback: Option<Fallback>,
    pub enter_events: Vec<StateEvent>,
    pub exit_events: Vec<StateEvent>,
    pub events: Vec<TimedEvent>,
}

/// An animation state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMachine {
    pub unk: u32,
    pub group_folders: Vec<String>,
    pub states: Vec<State>,
    pub var_params: Vec<VarParam>,
    pub animations: Vec<AnimationResource>,
    pub key_values: Vec<KeyValue>,
}

impl StateMachine {
    pub(crate) fn read(ctx: &Context<'_>, at: usize) -> Result<Self> {
        let header: RawHeader = ctx.read(at)?;
        let at = ctx
            .resolve(header.assembly)?
            .ok_or_else(|| Error::invariant("ASMB block has no assembly"))?;
        let raw: RawAssembly = ctx.read(at)?;

        let group_folders = ctx
            .values(raw.group_folders.pointer(), raw.group_folders.len())?
            .into_iter()
            .map(|name| ctx.string(name))
            .collect::<Result<Vec<_>>>()?;

        let var_params = ctx
            .values(raw.var_params.pointer(), raw.var_params.len())?
            .into_iter()
            .map(|param| {
                let kind = match param.kind {
                    0 => VarParamType::Int,
                    1 => VarParamType::Float,
                    other => {
                        return Err(Error::InvalidValue {
                            what: "var param type",
                            value: other,
                        })
                    }
                };
                Ok(VarParam {
                    name: ctx.string(param.name)?,
                    kind,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let animations = ctx
            .values(raw.animations.pointer(), raw.animations.len())?
            .into_iter()
            .map(|animation| {
                let used = animation.used_in_states;
                let used = ctx.values(used.pointer(), used.len())?;
                Ok(AnimationResource {
                    path: ctx.string(animation.path)?,
                    used_in_states: used.into_iter().map(|state| state.index).collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let key_values = ctx
            .values(raw.key_values.pointer(), raw.key_values.len())?
            .into_iter()
            .map(|pair| {
                Ok(KeyValue {
                    key: ctx.string(pair.key)?,
                    value: ctx.string(pair.value)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let states = ctx
            .values(raw.states.pointer(), raw.states.len())?
            .into_iter()
            .map(|state| {
                let at = ctx
                    .resolve(state)?
                    .ok_or_else(|| Error::invariant("null state in ASMB state graph"))?;
                read_state(ctx, at)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(StateMachine {
            unk: raw.unk,
            group_folders,
            states,
            var_params,
            animations,
            key_values,
        })
    }

    /// Index of the state called `name`.
    pub fn state(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|state| state.name == name)
    }
}

fn read_state(ctx: &Context<'_>, at: usize) -> Result<State> {
    let raw: RawStateBase = ctx.read(at)?;
    let name = ctx.string(raw.name)?;
    trace!(name = %name, kind = raw.kind, "Reading ASMB state");

    let kind = match raw.kind {
        0 => StateKind::Animation(read_anim(ctx, ctx.read(at + STATE_BASE_SIZE)?)?),
        1 => {
            let exit: RawExitAnim = ctx.read(at + STATE_BASE_SIZE)?;
            StateKind::ExitAnim(ExitAnim {
                path: ctx.string(exit.path)?,
                group_folder: exit.group_folder,
                unk01: exit.unk01,
                unk03: exit.unk03,
                unk04: exit.unk04,
                unk05: exit.unk05,
            })
        }
        2 => {
            let blend: Pointer64<RawBlend> = ctx.read(at + STATE_BASE_SIZE)?;
            let blend_at = ctx
                .resolve(blend)?
                .ok_or_else(|| Error::invariant(format!("blend state {name} has no blend")))?;
            StateKind::Blend(read_blend(ctx, blend_at)?)
        }
        other => {
            return Err(Error::InvalidValue {
                what: "state type",
                value: other,
            })
        }
    };

    let transitions = ctx
        .values(raw.transitions.pointer(), raw.transitions.len())?
        .into_iter()
        .map(|transition| {
            let at = ctx
                .resolve(transition)?
                .ok_or_else(|| Error::invariant(format!("state {name} has a null transition")))?;
            read_transition(ctx, at)
        })
        .collect::<Result<Vec<_>>>()?;

    let fallback = match ctx.resolve(raw.fallback)? {
        Some(at) => {
            let fallback: RawFallback = ctx.read(at)?;
            Some(Fallback {
                name: ctx.string(fallback.name)?,
                unk00: fallback.unk00,
                unk01: fallback.unk01,
                unk02: fallback.unk02,
                unk03: fallback.unk03,
                unk04: fallback.unk04,
            })
        }
        None => None,
    };

    let state_events = |events: BcArray<RawStateEvent>| -> Result<Vec<StateEvent>> {
        ctx.values(events.pointer(), events.len())?
            .into_iter()
            .map(|event| read_event(ctx, event))
            .collect()
    };

    let events = ctx
        .values(raw.events.pointer(), raw.events.len())?
        .into_iter()
        .map(|event| {
            Ok(TimedEvent {
                trigger_frame: event.trigger_frame,
                event: read_event(ctx, event.event)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(State {
        name,
        unk0: raw.unk0,
        kind,
        transitions,
        fallback,
        enter_events: state_events(raw.enter_events)?,
        exit_events: state_events(raw.exit_events)?,
        events,
    })
}

fn read_event(ctx: &Context<'_>, raw: RawStateEvent) -> Result<StateEvent> {
    let value = if raw.value.is_null() {
        None
    } else {
        Some(ctx.string(raw.value)?)
    };
    Ok(StateEvent {
        name: ctx.string(raw.name)?,
        value,
    })
}

fn read_anim(ctx: &Context<'_>, raw: RawAnimRef) -> Result<AnimRef> {
    Ok(AnimRef {
        path: ctx.string(raw.path)?,
        group_folder: raw.group_folder,
        mirrored: raw.mirrored != 0,
        unk02: raw.unk02,
        unk03: raw.unk03,
        unk04: raw.unk04,
    })
}

fn read_blend(ctx: &Context<'_>, at: usize) -> Result<Blend> {
    let raw: RawBlend = ctx.read(at)?;
    let anims_at = at + BLEND_BASE_SIZE;

    let (kind, blends) = match raw.kind {
        2 => (BlendKind::OneDimensional, ctx.read::<BcArray<RawBlendAnim>>(anims_at)?),
        4 => {
            let bases: BcArray<RawAnimRef> = ctx.read(anims_at)?;
            if bases.len() != 1 {
                return Err(Error::invariant(format!(
                    "basis blend has {} base animations",
                    bases.len()
                )));
            }
            let base = ctx
                .values(bases.pointer(), 1)?
                .into_iter()
                .next()
                .ok_or_else(|| Error::invariant("basis blend has no base animation"))?;
            let base = read_anim(ctx, base)?;
            (
                BlendKind::OneDimensionalBasis { base },
                ctx.read::<BcArray<RawBlendAnim>>(anims_at + 16)?,
            )
        }
        other => {
            return Err(Error::InvalidValue {
                what: "blend type",
                value: other,
            })
        }
    };

    let blends = ctx
        .values(blends.pointer(), blends.len())?
        .into_iter()
        .map(|blend| {
            Ok(BlendAnim {
                trigger_value: blend.trigger_value,
                anim: read_anim(ctx, blend.anim)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Blend {
        kind,
        var_param: raw.var_param,
        blends,
    })
}

fn read_target(ctx: &Context<'_>, raw: RawTarget) -> Result<Target> {
    Ok(Target {
        state: ctx.string(raw.state)?,
        unk00: raw.unk00,
        unk01: raw.unk01,
    })
}

fn read_transition(ctx: &Context<'_>, at: usize) -> Result<Transition> {
    let raw: RawTransition = ctx.read(at)?;
    let at = at + TRANSITION_BASE_SIZE;

    let kind = match raw.kind {
        0 => TransitionKind::Basic(read_target(ctx, ctx.read(at)?)?),
        1 => {
            let spans: BcArray<RawSpan> = ctx.read(at)?;
            TransitionKind::Spans(
                ctx.values(spans.pointer(), spans.len())?
                    .into_iter()
                    .map(|span| {
                        Ok(Span {
                            name: ctx.string(span.name)?,
                            target: ctx.string(span.target)?,
                            begin: span.begin,
                            end: span.end,
                            unk01: span.unk01,
                            unk02: span.unk02,
                            unk03: span.unk03,
                            unk04: span.unk04,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            )
        }
        2 => {
            let switch: RawSwitch = ctx.read(at)?;
            let cases = ctx
                .values(switch.cases.pointer(), switch.cases.len())?
                .into_iter()
                .map(|case| {
                    Ok(Case {
                        value: case.value,
                        target: read_target(ctx, case.target)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            TransitionKind::Switch {
                var_param: switch.var_param,
                cases,
            }
        }
        other => {
            return Err(Error::InvalidValue {
                what: "transition type",
                value: other,
            })
        }
    };

    Ok(Transition {
        name: ctx.string(raw.name)?,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use binrw::Endian;

    use super::*;
    use crate::bc::tests::{finish, header};
    use crate::bc::Bc;
    use crate::context::ProcessOptions;
    use crate::test_util::Builder;

    struct Fixture {
        b: Builder,
        pointers: Vec<usize>,
    }

    impl Fixture {
        fn point(&mut self, at: usize, target: usize) {
            self.b.patch_u64(at, target as u64);
            self.pointers.push(at);
        }

        fn array(&mut self, at: usize, target: usize, count: u32) {
            self.point(at, target);
            self.b.patch_u32(at + 8, count);
        }

        fn string(&mut self, at: usize, value: &str) {
            let target = self.b.pos();
            self.b.cstr(value);
            self.point(at, target);
        }
    }

    fn anim(b: &mut Builder, group_folder: u32, mirrored: u32) {
        b.u64(0).u32(group_folder).u32(mirrored).f32(0.5).f32(1.0).u32(0).f32(0.25);
    }

    fn target(b: &mut Builder) {
        b.u64(0).f32s(&[0.1, 0.2, 0.0, 0.0, 0.0, 0.0]).u32(0).u32(1);
    }

    /// Two states: "idle" plays an animation and switches to "move", which blends two animations.
    fn state_machine(idle_kind: u32) -> Vec<u8> {
        let mut f = Fixture {
            b: Builder::new(Endian::Little),
            pointers: Vec::new(),
        };
        header(&mut f.b);
        let block = f.b.pos();
        f.b.u32(0).bytes(&ASMB_MAGIC).u64(0);

        let assembly = f.b.pos();
        f.b.u32(7).u32(0).zeros(88);

        let folders = f.b.pos();
        f.b.u64(0);
        let states = f.b.pos();
        f.b.u64(0).u64(0);
        let var_params = f.b.pos();
        f.b.u32(1).u32(0).u64(0);
        let resources = f.b.pos();
        f.b.u64(0).zeros(16);
        let used = f.b.pos();
        f.b.u32(0).u32(u32::MAX);
        let key_values = f.b.pos();
        f.b.u64(0).u64(0);

        let idle = f.b.pos();
        f.b.u32(idle_kind).u32(0).u64(0).u32s(&[1, 2, 3]).u32(0).zeros(16).u64(0).zeros(48);
        anim(&mut f.b, 0, 1);
        let idle_transitions = f.b.pos();
        f.b.u64(0);
        let fallback = f.b.pos();
        f.b.u64(0).u32(1).u32(1).u32(0).u32(0).u32(0).f32(0.5).u32(1).u32(0);
        let enter = f.b.pos();
        f.b.u64(0).u32(1).u32(0).u64(0);
        let events = f.b.pos();
        f.b.f32(3.0).u32(0).u64(0).u32(1).u32(0).u64(0);
        let switch = f.b.pos();
        f.b.u64(0).u32(2).u32(0).u32(0).u32(0).zeros(16);
        let cases = f.b.pos();
        f.b.u32(1).u32(0);
        target(&mut f.b);

        let moving = f.b.pos();
        f.b.u32(2).u32(0).u64(0).zeros(32).u64(0).zeros(48).u64(0);
        let moving_transitions = f.b.pos();
        f.b.u64(0).u64(0);
        let blend = f.b.pos();
        f.b.u32(2).u32(0).zeros(16);
        let blend_anims = f.b.pos();
        for trigger in [0.0, 1.0] {
            f.b.f32(trigger).u32(0);
            anim(&mut f.b, 0, 0);
        }
        let basic = f.b.pos();
        f.b.u64(0).u32(0).u32(0);
        target(&mut f.b);
        let span_transition = f.b.pos();
        f.b.u64(0).u32(1).u32(0).zeros(16);
        let spans = f.b.pos();
        f.b.u64(0).u32(0).u32(0).u64(0).f32(0.0).f32(0.5);
        f.b.u32(3).u32(0).u32(0).f32(1.5).u32(1).u32(0);

        f.point(block + 8, assembly);
        f.array(assembly + 8, folders, 1);
        f.array(assembly + 24, states, 2);
        f.array(assembly + 40, var_params, 1);
        f.array(assembly + 56, resources, 1);
        f.array(assembly + 80, key_values, 1);
        f.point(states, idle);
        f.point(states + 8, moving);
        f.array(resources + 8, used, 1);

        f.array(idle + 32, idle_transitions, 1);
        f.point(idle + 48, fallback);
        f.array(idle + 56, enter, 1);
        f.array(idle + 88, events, 1);
        f.point(idle_transitions, switch);
        f.array(switch + 24, cases, 1);

        f.array(moving + 32, moving_transitions, 2);
        f.point(moving + STATE_BASE_SIZE, blend);
        f.point(moving_transitions, basic);
        f.point(moving_transitions + 8, span_transition);
        f.array(blend + 8, blend_anims, 2);
        f.array(span_transition + 16, spans, 1);

        for (at, value) in [
            (folders, "chr/pc"),
            (var_params + 8, "speed"),
            (resources, "idle.anm"),
            (key_values, "mode"),
            (key_values + 8, "walk"),
            (idle + 8, "idle"),
            (idle + STATE_BASE_SIZE, "idle.anm"),
            (fallback, "rest"),
            (enter, "start"),
            (events + 8, "step"),
            (events + 24, "left"),
            (switch, "to_move"),
            (cases + 8, "move"),
            (moving + 8, "move"),
            (blend_anims + 8, "walk.anm"),
            (blend_anims + 48, "run.anm"),
            (basic, "back"),
            (basic + 16, "idle"),
            (span_transition, "spans"),
            (spans, "early"),
            (spans + 16, "idle"),
        ] {
            f.string(at, value);
        }

        let Fixture { mut b, pointers } = f;
        finish(&mut b, &pointers)
    }

    #[test]
    fn read_state_machine() {
        let bc = Bc::from_existing(&state_machine(0), &ProcessOptions::default()).unwrap();
        let machine = bc.state_machine().unwrap();
        assert_eq!(machine.unk, 7);
        assert_eq!(machine.group_folders, ["chr/pc"]);
        assert_eq!(
            machine.var_params,
            [VarParam {
                name: "speed".to_string(),
                kind: VarParamType::Float
            }]
        );
        assert_eq!(machine.animations[0].path, "idle.anm");
        assert_eq!(machine.animations[0].used_in_states, [0]);
        assert_eq!(machine.key_values[0].value, "walk");
        assert_eq!(machine.state("move"), Some(1));

        let idle = &machine.states[0];
        assert_eq!(idle.unk0, [1, 2, 3]);
        let StateKind::Animation(anim) = &idle.kind else {
            panic!("idle is not an animation state");
        };
        assert_eq!(anim.path, "idle.anm");
        assert!(anim.mirrored);
        assert_eq!(idle.fallback.as_ref().map(|f| f.name.as_str()), Some("rest"));
        assert_eq!(
            idle.enter_events,
            [StateEvent {
                name: "start".to_string(),
                value: None
            }]
        );
        assert!(idle.exit_events.is_empty());
        assert_eq!(idle.events[0].trigger_frame, 3.0);
        assert_eq!(idle.events[0].event.value.as_deref(), Some("left"));

        let TransitionKind::Switch { var_param, cases } = &idle.transitions[0].kind else {
            panic!("idle does not switch");
        };
        assert_eq!(idle.transitions[0].name, "to_move");
        assert_eq!(*var_param, 0);
        assert_eq!(cases[0].value, 1);
        assert_eq!(cases[0].target.state, "move");
        assert_eq!(cases[0].target.unk01, [0, 1]);
    }

    #[test]
    fn blends_and_spans() {
        let bc = Bc::from_existing(&state_machine(0), &ProcessOptions::default()).unwrap();
        let moving = &bc.state_machine().unwrap().states[1];
        assert!(moving.fallback.is_none());

        let StateKind::Blend(blend) = &moving.kind else {
            panic!("move is not a blend state");
        };
        assert_eq!(blend.kind, BlendKind::OneDimensional);
        assert_eq!(blend.blends.len(), 2);
        assert_eq!(blend.blends[1].trigger_value, 1.0);
        assert_eq!(blend.blends[1].anim.path, "run.anm");

        assert_eq!(moving.transitions[0].kind, {
            let mut target = Target {
                state: "idle".to_string(),
                unk00: [0.0; 6],
                unk01: [0, 1],
            };
            target.unk00[..2].copy_from_slice(&[0.1, 0.2]);
            TransitionKind::Basic(target)
        });
        let TransitionKind::Spans(spans) = &moving.transitions[1].kind else {
            panic!("second transition has no spans");
        };
        assert_eq!(spans[0].name, "early");
        assert_eq!(spans[0].target, "idle");
        assert_eq!((spans[0].begin, spans[0].end), (0.0, 0.5));
        assert_eq!(spans[0].unk01, 3);
    }

    #[test]
    fn unknown_state_type() {
        assert!(matches!(
            Bc::from_existing(&state_machine(9), &ProcessOptions::default()),
            Err(Error::InvalidValue {
                what: "state type",
                value: 9
            })
        ));
    }
}
