use eframe::egui::Vec2;

use super::error::FullscreenError;

/// One way of putting the presentation into fullscreen. Hosts usually offer a
/// preferred backend and one or more fallbacks.
pub trait FullscreenBackend {
    fn name(&self) -> &'static str;
    fn request(&mut self) -> Result<(), FullscreenError>;
    fn exit(&mut self) -> Result<(), FullscreenError>;
    fn is_fullscreen(&self) -> bool;
}

/// Which optional pieces of the overlay skeleton the host renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skeleton {
    pub canvas: bool,
    pub outline_panel: bool,
}

impl Default for Skeleton {
    fn default() -> Self {
        Self {
            canvas: true,
            outline_panel: true,
        }
    }
}

/// The environment the overlay runs in: it renders the skeleton, lays out the
/// presented content and owns the window.
pub trait Host {
    fn skeleton(&self) -> Skeleton {
        Skeleton::default()
    }

    /// Size of the overlay viewport in logical pixels.
    fn viewport_size(&self) -> Vec2;

    fn pixel_ratio(&self) -> f32;

    /// Unscaled distance from the top of the content to the `index`-th outline
    /// heading, if it has been laid out.
    fn heading_offset(&self, index: usize) -> Option<f32>;

    /// Unscaled height of the laid out content.
    fn content_height(&self) -> f32;

    fn fullscreen_backends(&self) -> &[Box<dyn FullscreenBackend>];

    fn fullscreen_backends_mut(&mut self) -> &mut [Box<dyn FullscreenBackend>];

    fn is_fullscreen(&self) -> bool {
        self.fullscreen_backends().iter().any(|b| b.is_fullscreen())
    }

    /// Try each backend in order and stop at the first that accepts.
    /// Returns the name of the backend that took the request.
    fn request_fullscreen(&mut self) -> Result<&'static str, FullscreenError> {
        let mut last = FullscreenError::NoBackend;
        for backend in self.fullscreen_backends_mut() {
            match backend.request() {
                Ok(()) => return Ok(backend.name()),
                Err(e) => {
                    tracing::debug!(backend = backend.name(), "fullscreen fallback: {e}");
                    last = e;
                }
            }
        }
        Err(last)
    }

    /// Leave fullscreen through whichever backend currently holds it.
    fn exit_fullscreen(&mut self) -> Result<(), FullscreenError> {
        let mut last = FullscreenError::NoBackend;
        for backend in self.fullscreen_backends_mut() {
            if !backend.is_fullscreen() {
                continue;
            }
            match backend.exit() {
                Ok(()) => return Ok(()),
                Err(e) => last = e,
            }
        }
        Err(last)
    }
}


#[cfg(test)]
mod tests {
    use super::fake::{FakeBackend, FakeHost};
    use super::*;

    #[test]
    fn test_falls_back_to_next_backend() {
        let mut host = FakeHost::new();
        let first = FakeBackend::new("native", false);
        let second = FakeBackend::new("borderless", true);
        let tried = first.requests.clone();
        let state = second.state.clone();
        host.backends.push(Box::new(first));
        host.backends.push(Box::new(second));

        assert_eq!(host.request_fullscreen(), Ok("borderless"));
        assert_eq!(tried.get(), 1);
        assert!(state.get());
        assert!(host.is_fullscreen());

        host.exit_fullscreen().unwrap();
        assert!(!host.is_fullscreen());
    }

    #[test]
    fn test_all_backends_fail() {
        let mut host = FakeHost::new();
        host.backends.push(Box::new(FakeBackend::new("native", false)));
        assert_eq!(
            host.request_fullscreen(),
            Err(FullscreenError::Unsupported("native"))
        );
        assert!(!host.is_fullscreen());
    }

    #[test]
    fn test_no_backends() {
        let mut host = FakeHost::new();
        assert_eq!(host.request_fullscreen(), Err(FullscreenError::NoBackend));
        assert_eq!(host.exit_fullscreen(), Err(FullscreenError::NoBackend));
    }
}
