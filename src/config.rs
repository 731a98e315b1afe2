/// Tunables for a [`Heap`](crate::Heap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Upper bound on the bytes the heap may hold from its break manager.
  pub limit: Option<usize>,
  /// Log break movements and failed requests through `log`.
  ///
  /// Leave this off for a heap installed as the global allocator: the logger
  /// would allocate from the heap it is reporting on.
  pub log_events: bool,
}

impl HeapConfig {
  pub const fn new() -> Self {
    Self {
      limit: None,
      log_events: false,
    }
  }

  pub const fn with_limit(
    mut self,
    limit: usize,
  ) -> Self {
    self.limit = Some(limit);
    self
  }

  pub const fn with_log_events(
    mut self,
    log_events: bool,
  ) -> Self {
    self.log_events = log_events;
    self
  }

  /// Whether a heap already holding `held` bytes may grow by `increment`.
  pub(crate) fn allows(
    &self,
    held: usize,
    increment: usize,
  ) -> bool {
    match self.limit {
      Some(limit) => held.checked_add(increment).is_some_and(|total| total <= limit),
      None => true,
    }
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::new()
  }
}
