//! Compiled shader cache.
//!
//! Shaders are keyed by a SHA-1 digest of the target and the source text. Each key owns a slot
//! that is locked for the whole compilation, so concurrent requests for the same shader wait for a
//! single compilation instead of running their own. A failed compilation drops its slot.
//!
//! The map of slots is never held while waiting on a slot.

use log::debug;
use parking_lot::Mutex;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::sync::Arc;

use crate::codegen::Target;
use crate::compiler::{compile, CompiledShader, Context};
use crate::error::CompileError;

pub type CacheKey = [u8; 20];

type Slot = Mutex<Option<Arc<CompiledShader>>>;

#[derive(Default)]
pub struct ShaderCache {
  slots: Mutex<HashMap<CacheKey, Arc<Slot>>>
}

impl ShaderCache {
  pub fn new() -> Self {
    ShaderCache::default()
  }

  pub fn key(target: Target, source: &str) -> CacheKey {
    let mut hasher = Sha1::new();
    hasher.update(target.name().as_bytes());
    hasher.update(&[0u8]);
    hasher.update(source.as_bytes());

    let mut key = [0; 20];
    key.copy_from_slice(&hasher.finalize());
    key
  }

  /// Get an already compiled shader.
  pub fn get(&self, source: &str, target: Target) -> Option<Arc<CompiledShader>> {
    let slot = self.slots.lock().get(&Self::key(target, source)).cloned()?;
    let compiled = slot.lock();
    compiled.clone()
  }

  /// Get a compiled shader, compiling it if needed.
  pub fn get_or_compile(&self, source: &str, ctx: &Context) -> Result<Arc<CompiledShader>, CompileError> {
    let key = Self::key(ctx.target(), source);
    let slot = self.slots.lock().entry(key).or_default().clone();
    let mut compiled = slot.lock();

    if let Some(ref shader) = *compiled {
      debug!("cache hit for \"{}\" ({})", shader.name, ctx.target());
      return Ok(shader.clone());
    }

    debug!("cache miss for {} ({})", ctx.file_name(), ctx.target());

    match compile(source, ctx) {
      Ok(shader) => {
        let shader = Arc::new(shader);
        *compiled = Some(shader.clone());
        Ok(shader)
      }

      Err(e) => {
        let mut slots = self.slots.lock();

        if slots.get(&key).map_or(false, |held| Arc::ptr_eq(held, &slot)) {
          slots.remove(&key);
        }

        Err(e)
      }
    }
  }

  /// Number of compiled shaders held.
  ///
  /// Waits for the compilations in progress.
  pub fn len(&self) -> usize {
    let slots: Vec<_> = self.slots.lock().values().cloned().collect();
    slots.iter().filter(|slot| slot.lock().is_some()).count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn clear(&self) {
    self.slots.lock().clear();
  }
}
