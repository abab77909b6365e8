// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 cohort contributors

//! Presentation policy and engine tuning knobs.
//!
//! [`Presentation`] controls how samples are presented to the subscriber:
//! access scope, coherent access, and what happens to coherent sets that
//! can no longer complete. [`QoS`] bundles the policy with the runtime
//! knobs of the engine (grace period, buffer capacity, dispatch tick).
//! Loading these from configuration files is a collaborator concern.

use std::time::Duration;

/// Default dispatcher tick when no data arrives.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// PRESENTATION access scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PresentationAccessScope {
    /// Instance-level access (default). No transactional semantics.
    #[default]
    Instance = 0,
    /// Topic-level access. Changes within one stream presented together.
    Topic = 1,
    /// Group-level access. Multiple streams presented as a coherent set.
    Group = 2,
}

/// PRESENTATION policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    /// Access scope (INSTANCE, TOPIC, or GROUP).
    pub access_scope: PresentationAccessScope,
    /// Whether changes are presented coherently.
    pub coherent_access: bool,
    /// Whether samples are presented in order.
    pub ordered_access: bool,
    /// Discard every buffered sample of a coherent set that cannot
    /// complete (default). When `false`, whatever arrived is delivered
    /// individually, tagged incomplete.
    pub drop_incomplete_coherent_set: bool,
}

impl Default for Presentation {
    fn default() -> Self {
        Self::instance()
    }
}

impl Presentation {
    #[must_use]
    pub fn instance() -> Self {
        Self {
            access_scope: PresentationAccessScope::Instance,
            coherent_access: false,
            ordered_access: false,
            drop_incomplete_coherent_set: true,
        }
    }

    #[must_use]
    pub fn topic_coherent() -> Self {
        Self {
            access_scope: PresentationAccessScope::Topic,
            coherent_access: true,
            ordered_access: false,
            drop_incomplete_coherent_set: true,
        }
    }

    #[must_use]
    pub fn group_coherent() -> Self {
        Self {
            access_scope: PresentationAccessScope::Group,
            coherent_access: true,
            ordered_access: false,
            drop_incomplete_coherent_set: true,
        }
    }

    #[must_use]
    pub fn group_coherent_ordered() -> Self {
        Self {
            access_scope: PresentationAccessScope::Group,
            coherent_access: true,
            ordered_access: true,
            drop_incomplete_coherent_set: true,
        }
    }

    /// Keep salvaged samples of incomplete sets instead of dropping them.
    #[must_use]
    pub fn keep_incomplete(mut self) -> Self {
        self.drop_incomplete_coherent_set = false;
        self
    }

    /// Offered policy satisfies a requested one.
    #[must_use]
    pub fn is_compatible_with(&self, requested: &Presentation) -> bool {
        if self.access_scope < requested.access_scope {
            return false;
        }
        if requested.coherent_access && !self.coherent_access {
            return false;
        }
        if requested.ordered_access && !self.ordered_access {
            return false;
        }
        true
    }

    #[must_use]
    pub fn is_group_scope(&self) -> bool {
        self.access_scope == PresentationAccessScope::Group
    }
}

/// Engine configuration: presentation policy plus runtime knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QoS {
    /// How samples are presented to the subscriber.
    pub presentation: Presentation,
    /// Declare a coherent set incomplete after this long without progress.
    /// `None` (default) relies on gap inference alone.
    pub grace_period: Option<Duration>,
    /// Per-stream buffer bound. `None` (default) means unbounded.
    pub buffer_capacity: Option<usize>,
    /// Upper bound on one dispatcher wait; the loop ticks at least this
    /// often even without data so shutdown requests are observed.
    pub tick: Duration,
}

impl Default for QoS {
    fn default() -> Self {
        Self {
            presentation: Presentation::default(),
            grace_period: None,
            buffer_capacity: None,
            tick: DEFAULT_TICK,
        }
    }
}

impl QoS {
    /// Replace the presentation policy.
    #[must_use]
    pub fn presentation(mut self, presentation: Presentation) -> Self {
        self.presentation = presentation;
        self
    }

    /// GROUP-scope coherent presentation (the engine's reason to exist).
    #[must_use]
    pub fn group_coherent(mut self) -> Self {
        self.presentation = Presentation::group_coherent();
        self
    }

    /// Keep salvaged samples of incomplete sets instead of dropping them.
    #[must_use]
    pub fn keep_incomplete(mut self) -> Self {
        self.presentation = self.presentation.keep_incomplete();
        self
    }

    /// Enable the grace-period incompleteness trigger.
    #[must_use]
    pub fn grace_period(mut self, period: Duration) -> Self {
        self.grace_period = Some(period);
        self
    }

    /// Bound every stream buffer to `capacity` samples.
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = Some(capacity);
        self
    }

    /// Override the dispatcher tick.
    #[must_use]
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }
}
