/// Depth buffer precision.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DepthFormat {
    /// 16-bit depth.
    D16,
    /// 32-bit float depth.
    D32Float,
}

/// How presented frames pace against the display.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PresentInterval {
    /// Present as fast as possible, never waiting for vertical sync.
    Immediate,
    /// Present in step with vertical sync.
    Vsync,
}

/// Presentation parameters, fixed at renderer construction.
///
/// Keep this structure stable and minimal; it is re-applied verbatim on
/// every device reset, so runtime mutation would desynchronize recovery.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PresentParams {
    /// Back buffer width in pixels.
    pub width: u32,
    /// Back buffer height in pixels.
    pub height: u32,
    /// Take over the whole display instead of rendering into a window.
    pub fullscreen: bool,
    /// Depth buffer precision.
    pub depth_format: DepthFormat,
    /// Frame pacing.
    pub present_interval: PresentInterval,
}

impl Default for PresentParams {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 1024,
            fullscreen: false,
            depth_format: DepthFormat::D16,
            present_interval: PresentInterval::Immediate,
        }
    }
}
