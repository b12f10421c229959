//! Cross-module frame-engine scenarios (spec §8 #1, #2, #5, #6).

use std::sync::Arc;

use loomframe::component::{ComponentId, ComponentRegistry, ComponentTypeDesc, Life, LIFE_ID};
use loomframe::config::EngineConfig;
use loomframe::engine::Engine;
use loomframe::entity;
use loomframe::process::{Context, FutureArity, FutureSlot, OverloadDescriptor, Process, ProcessRegistry};
use loomframe::resource::ResourceState;
use loomframe::source::{MapSource, Source};

const POSITION: ComponentId = 17;
const TAG: ComponentId = 18;

fn f32_loader(src: &dyn Source, out: &mut [u8]) -> bool {
    let mut v = 0.0;
    if !src.read_to_f64(&mut v) {
        return false;
    }
    out.copy_from_slice(&(v as f32).to_le_bytes());
    true
}

fn read_f32(bytes: &[u8]) -> f32 {
    f32::from_le_bytes(bytes.try_into().unwrap())
}

fn base_registry() -> ComponentRegistry {
    let mut reg = ComponentRegistry::new();
    reg.register(ComponentTypeDesc::new(POSITION, 4).name("position").loader(f32_loader));
    reg.register(
        ComponentTypeDesc::new(TAG, 4)
            .name("tag")
            .max_per_entity(3)
            .loader(f32_loader),
    );
    reg.lock();
    reg
}

fn copy_position_process() -> Process {
    Process::new("copy_position").overload(
        OverloadDescriptor::new(Box::new(|past: &[&[u8]], fut: &mut FutureSlot<'_>, _ctx: &dyn Context| {
            fut.write(0, past[0]);
            1
        }))
        .reads([POSITION])
        .writes(POSITION, FutureArity::Single),
    )
}

/// Kills any entity whose position has drifted past 100.0.
fn life_process() -> Process {
    Process::new("life").overload(
        OverloadDescriptor::new(Box::new(|past: &[&[u8]], fut: &mut FutureSlot<'_>, _ctx: &dyn Context| {
            let alive = read_f32(past[0]) < 100.0;
            fut.write(0, &Life { alive }.to_bytes());
            1
        }))
        .reads([POSITION])
        .writes(LIFE_ID, FutureArity::Single),
    )
}

fn shrink_tag_process() -> Process {
    Process::new("shrink_tag").overload(
        OverloadDescriptor::new(Box::new(|past: &[&[u8]], fut: &mut FutureSlot<'_>, _ctx: &dyn Context| {
            let written = (past[0].len() / 4).min(2);
            for i in 0..written {
                fut.write(i, &past[0][i * 4..i * 4 + 4]);
            }
            written as u16
        }))
        .reads([TAG])
        .writes(TAG, FutureArity::Multi),
    )
}

fn engine_with(registry: ComponentRegistry, processes: Vec<Process>) -> Engine {
    let mut process_registry = ProcessRegistry::new();
    for p in processes {
        process_registry.register(p);
    }
    process_registry.lock();
    Engine::new(registry, process_registry, EngineConfig::default().worker_threads(2))
}

fn position_prototype(x: f64) -> MapSource {
    MapSource::Mapping(vec![("position".into(), MapSource::F64(x))])
}

#[test]
fn copy_preserve_across_frames() {
    let registry = base_registry();
    let mut engine = engine_with(registry, vec![copy_position_process(), life_process()]);

    let handle = engine.request_prototype(Arc::new(position_prototype(5.0)));
    engine.request_prototype_load(handle);
    let id = engine.add_entity(handle);
    assert_ne!(id, entity::NONE);

    for _ in 0..3 {
        engine.run_frame();
        assert!(engine.is_alive(id));
        assert_eq!(read_f32(engine.component(id, POSITION).unwrap()), 5.0);
    }
}

#[test]
fn death_propagates_to_the_next_frame() {
    // No process writes Life at all: the entity's directly-admitted
    // Life{alive:true} survives the frame it's born in, then every
    // future Life write is simply absent, so the entity reads dead as
    // soon as that empty future becomes past.
    let registry = base_registry();
    let mut engine = engine_with(registry, vec![copy_position_process()]);

    let handle = engine.request_prototype(Arc::new(position_prototype(150.0)));
    engine.request_prototype_load(handle);
    let id = engine.add_entity(handle);

    engine.run_frame();
    assert!(engine.entities().contains(&id));
    assert!(engine.is_alive(id));

    engine.run_frame();
    assert!(!engine.is_alive(id));
    assert!(!engine.entities().contains(&id));
    assert!(engine.entities().is_empty());
}

#[test]
fn prototype_load_failure_drops_the_birth() {
    let registry = base_registry();
    let mut engine = engine_with(registry, vec![copy_position_process(), life_process()]);

    let handle = engine.request_prototype(Arc::new(MapSource::Null));
    engine.request_prototype_load(handle);
    let id = engine.add_entity(handle);

    engine.run_frame();
    assert_eq!(engine.prototype_state(handle), ResourceState::LoadFailed);
    assert_eq!(engine.failed_prototypes().len(), 1);
    assert!(!engine.entities().contains(&id));
}

#[test]
fn multi_component_write_can_shorten_the_slice() {
    let registry = base_registry();
    let mut engine = engine_with(
        registry,
        vec![copy_position_process(), life_process(), shrink_tag_process()],
    );

    let source = MapSource::Mapping(vec![
        ("position".into(), MapSource::F64(1.0)),
        (
            "tag".into(),
            MapSource::Sequence(vec![MapSource::F64(1.0), MapSource::F64(2.0), MapSource::F64(3.0)]),
        ),
    ]);
    let handle = engine.request_prototype(Arc::new(source));
    engine.request_prototype_load(handle);
    let id = engine.add_entity(handle);

    engine.run_frame();
    assert_eq!(engine.component(id, TAG).unwrap().len(), 12);

    engine.run_frame();
    let tag_bytes = engine.component(id, TAG).unwrap();
    assert_eq!(tag_bytes.len(), 8, "shrink_tag writes only 2 of the 3 components");
    assert_eq!(read_f32(&tag_bytes[0..4]), 1.0);
    assert_eq!(read_f32(&tag_bytes[4..8]), 2.0);
}
