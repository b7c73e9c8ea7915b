//! WGSL sources for the three wind programs.
//!
//! The update and draw programs share the field sampling code in
//! `wind_common.wgsl`, which is prepended to each of them.

const WIND_COMMON: &str = include_str!("../shaders/wind_common.wgsl");
const UPDATE: &str = include_str!("../shaders/update.wgsl");
const DRAW: &str = include_str!("../shaders/draw.wgsl");
const SCREEN: &str = include_str!("../shaders/screen.wgsl");

/// Advection compute program (`cs_update`).
pub fn update_source() -> String {
    format!("{WIND_COMMON}\n{UPDATE}")
}

/// Particle point program (`vs_main` / `fs_main`).
pub fn draw_source() -> String {
    format!("{WIND_COMMON}\n{DRAW}")
}

/// Fullscreen fade and composite program (`vs_fullscreen`, `fs_fade`, `fs_composite`).
pub fn screen_source() -> String {
    SCREEN.to_string()
}

/// Every program as `(label, source)`.
pub fn all_sources() -> Vec<(&'static str, String)> {
    vec![
        ("update", update_source()),
        ("draw", draw_source()),
        ("screen", screen_source()),
    ]
}
