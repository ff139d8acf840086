//! Frame timing: per-frame deltas and a smoothed FPS counter.

use web_time::{Duration, Instant};

/// Elapsed time of one frame, handed to effects that scale by frame rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Seconds since the previous frame.
    pub delta_seconds: f32,
}

impl FrameTime {
    /// A frame that took `delta_seconds`.
    #[must_use]
    pub const fn from_secs(delta_seconds: f32) -> Self {
        Self { delta_seconds }
    }

    /// A frame that took `elapsed`.
    #[must_use]
    pub fn from_duration(elapsed: Duration) -> Self {
        Self::from_secs(elapsed.as_secs_f32())
    }

    /// A frame at a steady `fps`. Non-positive rates give a zero delta.
    #[must_use]
    pub fn at_fps(fps: f32) -> Self {
        if fps > 0.0 {
            Self::from_secs(1.0 / fps)
        } else {
            Self::from_secs(0.0)
        }
    }

    /// Instantaneous frame rate, if the delta is positive and finite.
    #[must_use]
    pub fn fps(self) -> Option<f32> {
        (self.delta_seconds.is_finite() && self.delta_seconds > 0.0)
            .then(|| 1.0 / self.delta_seconds)
    }
}

/// Frame timing with FPS calculation and optional frame limiting
#[derive(Debug)]
pub struct FrameTiming {
    /// Target FPS (0 = unlimited)
    target_fps: u32,
    /// Minimum frame duration based on target FPS
    min_frame_duration: Duration,
    /// Last frame timestamp
    last_frame: Instant,
    /// Smoothed FPS using exponential moving average
    smoothed_fps: f32,
    /// Smoothing factor (lower = smoother, 0.0-1.0)
    smoothing: f32,
}

impl FrameTiming {
    /// Create a new frame timer with the given FPS target (0 = unlimited).
    #[must_use]
    pub fn new(target_fps: u32) -> Self {
        let min_frame_duration = if target_fps > 0 {
            Duration::from_secs_f64(1.0 / f64::from(target_fps))
        } else {
            Duration::ZERO
        };

        Self {
            target_fps,
            min_frame_duration,
            last_frame: Instant::now(),
            smoothed_fps: 60.0,
            smoothing: 0.05,
        }
    }

    /// Returns true if enough time has passed since the last frame to render.
    #[must_use]
    pub fn should_render(&self) -> bool {
        if self.target_fps == 0 {
            return true;
        }
        self.last_frame.elapsed() >= self.min_frame_duration
    }

    /// Time since the last [`end_frame`](Self::end_frame), without advancing.
    #[must_use]
    pub fn current(&self) -> FrameTime {
        FrameTime::from_duration(self.last_frame.elapsed())
    }

    /// Call after rendering to update timing. Returns the elapsed frame time.
    pub fn end_frame(&mut self) -> FrameTime {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame);
        self.last_frame = now;
        let frame = FrameTime::from_duration(elapsed);

        if let Some(instant_fps) = frame.fps() {
            // Exponential moving average for smooth display
            self.smoothed_fps = self.smoothed_fps * (1.0 - self.smoothing)
                + instant_fps * self.smoothing;
        }
        frame
    }

    /// Get the current FPS (smoothed)
    #[must_use]
    pub const fn fps(&self) -> f32 {
        self.smoothed_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_time_fps() {
        assert_eq!(FrameTime::from_secs(0.5).fps(), Some(2.0));
        assert_eq!(FrameTime::from_secs(0.0).fps(), None);
        assert_eq!(FrameTime::from_secs(f32::NAN).fps(), None);
        assert_eq!(FrameTime::at_fps(-1.0).delta_seconds, 0.0);
    }

    #[test]
    fn end_frame_reports_elapsed_time() {
        let mut timing = FrameTiming::new(0);
        assert!(timing.should_render());
        std::thread::sleep(Duration::from_millis(2));
        let frame = timing.end_frame();
        assert!(frame.delta_seconds >= 0.002);
    }
}
