//! Impact effects and messaging.
//!
//! Projectiles report impacts through [`EffectSink`]; they never touch actor
//! state themselves. The typed [`EventBus`] is the sink a world uses, so
//! presentation and gameplay layers can drain impacts after each tick.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use serde::{Deserialize, Serialize};

use crate::{
    ids::{ClientId, Tick},
    math::Vec2,
    tuning::WeaponKind,
};

/// A projectile hit something and its effects should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactEvent {
    pub tick: Tick,
    pub position: Vec2,
    pub owner: Option<ClientId>,
    pub weapon: WeaponKind,
    pub explosive: bool,
    pub freeze: bool,
    pub force: f32,
    pub sound_impact: Option<i32>,
}

/// Receives impact effects synchronously during a tick.
pub trait EffectSink {
    fn impact(&mut self, event: ImpactEvent);
}

impl EffectSink for Vec<ImpactEvent> {
    fn impact(&mut self, event: ImpactEvent) {
        self.push(event);
    }
}

/// Typed event bus.
#[derive(Default)]
pub struct EventBus {
    queues: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl EventBus {
    /// Pushes an event into the queue.
    pub fn push<E: 'static + Send + Sync>(&mut self, e: E) {
        let q = self
            .queues
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Vec::<E>::new()));
        let q = q.downcast_mut::<Vec<E>>().expect("queue type mismatch");
        q.push(e);
    }

    /// Number of queued events of a type.
    pub fn pending<E: 'static + Send + Sync>(&self) -> usize {
        self.queues
            .get(&TypeId::of::<E>())
            .and_then(|boxed| boxed.downcast_ref::<Vec<E>>())
            .map_or(0, Vec::len)
    }

    /// Drains all queued events of a type.
    pub fn drain<E: 'static + Send + Sync>(&mut self) -> Vec<E> {
        self.queues
            .remove(&TypeId::of::<E>())
            .and_then(|boxed| boxed.downcast::<Vec<E>>().ok())
            .map(|boxed| *boxed)
            .unwrap_or_default()
    }

    /// Drops every queued event.
    pub fn clear(&mut self) {
        self.queues.clear();
    }
}

impl EffectSink for EventBus {
    fn impact(&mut self, event: ImpactEvent) {
        self.push(event);
    }
}
