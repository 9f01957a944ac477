//! The remote protocol: the only scripts ever evaluated in the game page.
//!
//! Each constant is a function expression; arguments are passed as JSON.

/// Elapsed ticks of the CreateJS clock. Zero until the first frame.
pub const TICKS: &str = "() => createjs.Ticker.getTicks()";

pub const IS_PAUSED: &str = "() => createjs.Ticker.getPaused()";

pub const IS_DEAD: &str = "() => dead";

pub const SCORE_TEXT: &str = "() => counter.text";

pub const PAUSE: &str = r#"() => {
    if (!createjs.Ticker.getPaused()) {
        createjs.Ticker.setPaused(true);
    }
}"#;

pub const RESUME: &str = r#"() => {
    if (createjs.Ticker.getPaused()) {
        createjs.Ticker.setPaused(false);
    }
}"#;

/// Args: `seed`.
pub const RESTART: &str = r#"(seed) => {
    Math.seedrandom(seed);
    restart();
}"#;

/// Args: `includeSnapshot`, `mime`, `quality` (percent).
pub const STATE: &str = r#"(includeSnapshot, mime, quality) => {
    const { x, y, width, height } = stage.getBounds();
    const score = counter.text;
    const verticalPosition = (typeof bird !== 'undefined' && bird) ? bird.y : null;
    const snapshot = includeSnapshot ? stage.canvas.toDataURL(mime, quality / 100) : null;
    return {
        dimensions: { x, y, width, height },
        score,
        hiscore: score,
        started,
        dead,
        verticalPosition,
        snapshot,
    };
}"#;

/// Args: `selector`. Centre of the element in CSS pixels, or null.
pub const ELEMENT_CENTER: &str = r#"(selector) => {
    const el = document.querySelector(selector);
    if (!el) {
        return null;
    }
    const r = el.getBoundingClientRect();
    return { x: r.left + r.width / 2, y: r.top + r.height / 2 };
}"#;
