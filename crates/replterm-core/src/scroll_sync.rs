#![forbid(unsafe_code)]

//! Virtual-scrollbar synchronization for a fixed-row terminal widget.
//!
//! The widget keeps a fixed number of rows (200 by default) and scrolls its
//! own internal line buffer. The host page scrolls a real viewport over that
//! widget. Users should feel a single, unbounded scroll surface, so gestures
//! are read from an oversized *virtual track* and routed to whichever of the
//! two can move.
//!
//! # Design
//!
//! - [`VirtualTrack`] sits at its midpoint at rest. Each scroll event reports
//!   a new position; only `position - midpoint` matters, and the track is
//!   recentered immediately so the full gesture range is always available.
//! - [`ScrollSynchronizer`] turns that delta into real viewport movement
//!   ([`ScrollEffect::viewport_delta`]) while there is room, and into widget
//!   line scrolls ([`ScrollEffect::widget_lines`]) once the viewport is at the
//!   top edge (or, going down, while the widget is still scrolled back).
//! - Downward movement is clamped so the last non-blank line never rises
//!   above the bottom margin ([`ScrollSynchronizer::bottom_limit`]).
//! - Resizes are debounced; after one settles the viewport re-aligns to the
//!   bottom if the last line was near the bottom edge or now floats above it.
//!
//! Nothing here touches a DOM element. The host applies
//! [`ScrollSynchronizer::scroll_top`] to its viewport after every call and
//! forwards `widget_lines` to the widget.

use web_time::{Duration, Instant};

use crate::timer::IdleTimer;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for scroll synchronization.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollConfig {
    /// Rows allotted to the widget's backing buffer.
    pub rows: usize,
    /// Height of the virtual track in pixels.
    pub track_height: i64,
    /// Distance (px) from the bottom edge within which the last line still
    /// counts as bottom-aligned when a resize happens.
    pub realign_threshold_px: f64,
    /// Space (px) kept below the last line when bottom-aligned.
    pub bottom_margin_px: f64,
    /// Quiet time before a resize is applied.
    pub resize_debounce: Duration,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            rows: 200,
            track_height: 1_000_000,
            realign_threshold_px: 8.0,
            bottom_margin_px: 0.0,
            resize_debounce: Duration::from_millis(50),
        }
    }
}

// ---------------------------------------------------------------------------
// Virtual track
// ---------------------------------------------------------------------------

/// Oversized scroll surface used only to measure gesture deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualTrack {
    height: i64,
    midpoint: i64,
    position: i64,
}

impl VirtualTrack {
    /// Track of `height` px, resting at `height / 2`.
    #[must_use]
    pub fn new(height: i64) -> Self {
        let midpoint = height / 2;
        Self {
            height,
            midpoint,
            position: midpoint,
        }
    }

    #[must_use]
    pub const fn height(&self) -> i64 {
        self.height
    }

    #[must_use]
    pub const fn midpoint(&self) -> i64 {
        self.midpoint
    }

    /// Current position; always the midpoint between events.
    #[must_use]
    pub const fn position(&self) -> i64 {
        self.position
    }

    /// Read the delta of a scroll event and recenter.
    pub fn observe(&mut self, new_position: i64) -> i64 {
        let clamped = new_position.clamp(0, self.height);
        let delta = clamped - self.midpoint;
        self.position = self.midpoint;
        delta
    }
}

// ---------------------------------------------------------------------------
// Viewport
// ---------------------------------------------------------------------------

/// Geometry of the real viewport over the widget, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportMetrics {
    /// Current scroll offset of the viewport.
    pub scroll_top: f64,
    /// Visible height of the viewport.
    pub client_height: f64,
    /// Full height of the widget (all allotted rows).
    pub scroll_height: f64,
}

impl ViewportMetrics {
    #[must_use]
    pub fn new(client_height: f64, scroll_height: f64) -> Self {
        Self {
            scroll_top: 0.0,
            client_height,
            scroll_height,
        }
    }

    /// Largest scroll offset the real viewport allows.
    #[must_use]
    pub fn max_scroll_top(&self) -> f64 {
        (self.scroll_height - self.client_height).max(0.0)
    }
}

/// What the host must do after a scroll event.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollEffect {
    /// Net movement of the real viewport (px, positive = down).
    pub viewport_delta: f64,
    /// Lines the widget should scroll its internal buffer (negative = back).
    pub widget_lines: i32,
}

impl ScrollEffect {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.viewport_delta == 0.0 && self.widget_lines == 0
    }
}

/// Result of a settled resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeOutcome {
    /// The viewport was snapped back to the bottom.
    pub realigned: bool,
    /// Viewport movement caused by the realignment.
    pub viewport_delta: f64,
}

/// Point-in-time view of the synchronizer, for logs and replay output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSnapshot {
    pub scroll_top: f64,
    pub bottom_limit: f64,
    pub client_height: f64,
    pub last_line: Option<usize>,
    pub widget_offset: usize,
    pub widget_scrollback: usize,
    pub pinned: bool,
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

/// Scroll state for one mounted terminal widget.
#[derive(Debug, Clone)]
pub struct ScrollSynchronizer {
    config: ScrollConfig,
    track: VirtualTrack,
    metrics: ViewportMetrics,
    last_known_viewport_height: f64,
    /// Index of the last non-blank widget row.
    last_line: Option<usize>,
    /// Lines the widget has been scrolled back by gestures past the top edge.
    widget_offset: usize,
    /// How far back the widget's own buffer can scroll, as last reported.
    widget_scrollback: usize,
    /// Sub-row remainder of gestures forwarded to the widget.
    residual_px: f64,
    pinned: bool,
    resize_timer: IdleTimer,
    pending_resize: Option<ViewportMetrics>,
}

impl ScrollSynchronizer {
    /// Create a synchronizer pinned to the bottom.
    #[must_use]
    pub fn new(config: ScrollConfig, metrics: ViewportMetrics) -> Self {
        Self {
            track: VirtualTrack::new(config.track_height),
            resize_timer: IdleTimer::new(config.resize_debounce),
            last_known_viewport_height: metrics.client_height,
            metrics,
            config,
            last_line: None,
            widget_offset: 0,
            widget_scrollback: 0,
            residual_px: 0.0,
            pinned: true,
            pending_resize: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ScrollConfig {
        &self.config
    }

    #[must_use]
    pub fn track(&self) -> &VirtualTrack {
        &self.track
    }

    #[must_use]
    pub fn metrics(&self) -> ViewportMetrics {
        self.metrics
    }

    #[must_use]
    pub fn scroll_top(&self) -> f64 {
        self.metrics.scroll_top
    }

    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    #[must_use]
    pub fn widget_offset(&self) -> usize {
        self.widget_offset
    }

    #[must_use]
    pub fn last_line(&self) -> Option<usize> {
        self.last_line
    }

    /// Pixel height of one widget row.
    #[must_use]
    pub fn row_height(&self) -> f64 {
        if self.config.rows == 0 {
            return 0.0;
        }
        self.metrics.scroll_height / self.config.rows as f64
    }

    #[must_use]
    pub fn widget_scrollback(&self) -> usize {
        self.widget_scrollback
    }

    /// Record how many lines the widget can scroll back. Gestures past the
    /// top edge never forward more than this.
    pub fn set_widget_scrollback(&mut self, max: usize) {
        self.widget_scrollback = max;
        if self.widget_offset > max {
            self.widget_offset = max;
            self.residual_px = 0.0;
        }
    }

    /// Record the index of the last non-blank row after new output.
    pub fn set_last_line(&mut self, last_line: Option<usize>) {
        self.last_line = last_line;
    }

    /// Bottom edge of the last non-blank line, in widget pixels.
    fn content_bottom(&self, metrics: &ViewportMetrics) -> f64 {
        match self.last_line {
            Some(line) if self.config.rows > 0 => {
                let ratio = (line + 1) as f64 / self.config.rows as f64;
                ratio * metrics.scroll_height
            }
            _ => 0.0,
        }
    }

    fn limit_for(&self, metrics: &ViewportMetrics) -> f64 {
        let flush = self.content_bottom(metrics) + self.config.bottom_margin_px
            - metrics.client_height;
        flush.clamp(0.0, metrics.max_scroll_top())
    }

    /// Largest scroll offset that keeps the last line at or below the bottom
    /// margin.
    #[must_use]
    pub fn bottom_limit(&self) -> f64 {
        self.limit_for(&self.metrics)
    }

    /// Handle a scroll event reporting the virtual track's new position.
    pub fn on_scroll(&mut self, track_position: i64) -> ScrollEffect {
        let delta = self.track.observe(track_position);
        let effect = self.apply_delta(delta as f64);
        tracing::trace!(
            target: "replterm.scroll",
            delta,
            viewport_delta = effect.viewport_delta,
            widget_lines = effect.widget_lines,
            scroll_top = self.metrics.scroll_top,
            "scroll gesture"
        );
        effect
    }

    fn apply_delta(&mut self, delta: f64) -> ScrollEffect {
        if delta == 0.0 {
            return ScrollEffect::default();
        }
        if self.residual_px != 0.0 && self.residual_px.signum() != delta.signum() {
            self.residual_px = 0.0;
        }
        if delta < 0.0 {
            self.scroll_back(delta)
        } else {
            self.scroll_forward(delta)
        }
    }

    fn scroll_back(&mut self, delta: f64) -> ScrollEffect {
        let mut effect = ScrollEffect::default();
        let moved = delta.max(-self.metrics.scroll_top);
        self.metrics.scroll_top += moved;
        effect.viewport_delta = moved;

        let overrun = delta - moved;
        let row_height = self.row_height();
        if overrun < 0.0 && row_height > 0.0 {
            self.residual_px += overrun;
            let wanted = (-self.residual_px / row_height).trunc() as usize;
            let headroom = self.widget_scrollback.saturating_sub(self.widget_offset);
            let lines = wanted.min(headroom);
            if lines < wanted {
                // Past the widget's oldest line: nothing left to carry.
                self.residual_px = 0.0;
            } else {
                self.residual_px += lines as f64 * row_height;
            }
            if lines > 0 {
                effect.widget_lines = -i32::try_from(lines).unwrap_or(i32::MAX);
                self.widget_offset += lines;
            }
        }
        if !effect.is_noop() {
            self.pinned = false;
        }
        effect
    }

    fn scroll_forward(&mut self, delta: f64) -> ScrollEffect {
        let mut effect = ScrollEffect::default();
        let mut remaining = delta;

        let row_height = self.row_height();
        if self.widget_offset > 0 && row_height > 0.0 {
            self.residual_px += remaining;
            let lines = ((self.residual_px / row_height).trunc() as usize).min(self.widget_offset);
            self.residual_px -= lines as f64 * row_height;
            self.widget_offset -= lines;
            effect.widget_lines = lines as i32;
            if self.widget_offset > 0 {
                remaining = 0.0;
            } else {
                remaining = self.residual_px.max(0.0);
                self.residual_px = 0.0;
            }
        }

        let limit = self.bottom_limit();
        let room = (limit - self.metrics.scroll_top).max(0.0);
        let moved = remaining.min(room);
        self.metrics.scroll_top += moved;
        effect.viewport_delta = moved;

        if self.widget_offset == 0 && self.metrics.scroll_top >= limit {
            self.pinned = true;
        }
        effect
    }

    /// Snap the viewport to the bottom limit. Returns the movement.
    pub fn realign_bottom(&mut self) -> f64 {
        let limit = self.bottom_limit();
        let delta = limit - self.metrics.scroll_top;
        self.metrics.scroll_top = limit;
        delta
    }

    /// Keep new output visible.
    ///
    /// While pinned, re-aligns to the bottom and resets the widget's scroll
    /// back; returns `true` if the host should call the widget's
    /// `scroll_to_bottom`.
    pub fn follow_output(&mut self) -> bool {
        if !self.pinned {
            return false;
        }
        self.realign_bottom();
        self.widget_offset = 0;
        self.residual_px = 0.0;
        true
    }

    /// Return to the newest output and re-pin.
    pub fn jump_to_bottom(&mut self) {
        self.pinned = true;
        self.follow_output();
    }

    /// Record a viewport size change; applied once resizes settle.
    pub fn request_resize(&mut self, client_height: f64, scroll_height: f64, now: Instant) {
        self.pending_resize = Some(ViewportMetrics {
            scroll_top: self.metrics.scroll_top,
            client_height,
            scroll_height,
        });
        self.resize_timer.arm(now);
    }

    /// When the pending resize settles, if one is queued.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.resize_timer.deadline()
    }

    /// Apply a settled resize, if its debounce has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<ResizeOutcome> {
        if !self.resize_timer.fire(now) {
            return None;
        }
        let next = self.pending_resize.take()?;
        Some(self.apply_resize(next.client_height, next.scroll_height))
    }

    /// Apply a viewport size change immediately.
    pub fn apply_resize(&mut self, client_height: f64, scroll_height: f64) -> ResizeOutcome {
        let before = self.metrics;
        let before_bottom = self.content_bottom(&before);
        // Positive gap: last line sits above the viewport's bottom edge.
        let gap_before = before.scroll_top + self.last_known_viewport_height
            - before_bottom
            - self.config.bottom_margin_px;

        self.metrics.client_height = client_height;
        self.metrics.scroll_height = scroll_height;
        self.metrics.scroll_top = self.metrics.scroll_top.min(self.metrics.max_scroll_top());
        self.last_known_viewport_height = client_height;

        let after_bottom = self.content_bottom(&self.metrics);
        let gap_after = self.metrics.scroll_top + client_height - after_bottom
            - self.config.bottom_margin_px;

        let near_bottom = gap_before.abs() <= self.config.realign_threshold_px;
        let floating = gap_after > 0.0 && self.metrics.scroll_top > 0.0;
        let realigned = self.widget_offset == 0 && (near_bottom || floating);
        let viewport_delta = if realigned {
            self.realign_bottom()
        } else {
            0.0
        };
        tracing::debug!(
            target: "replterm.scroll",
            client_height,
            gap_before,
            gap_after,
            realigned,
            "viewport resized"
        );
        ResizeOutcome {
            realigned,
            viewport_delta,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ScrollSnapshot {
        ScrollSnapshot {
            scroll_top: self.metrics.scroll_top,
            bottom_limit: self.bottom_limit(),
            client_height: self.metrics.client_height,
            last_line: self.last_line,
            widget_offset: self.widget_offset,
            widget_scrollback: self.widget_scrollback,
            pinned: self.pinned,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
