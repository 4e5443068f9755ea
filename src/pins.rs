//! GPIO pin assignments for the intercom board (Broadcom numbering).
//!
//! Single source of truth for the default wiring; [`BridgeConfig`](crate::config::BridgeConfig)
//! starts from these values.

use crate::gpio::PinId;

// ---------------------------------------------------------------------------
// Push-to-talk
// ---------------------------------------------------------------------------

/// Momentary talk button. Pulled up, so pressed reads LOW.
pub const TALK_BUTTON_GPIO: PinId = PinId(16);
/// Talk LED. HIGH = on.
pub const TALK_LED_GPIO: PinId = PinId(12);

// ---------------------------------------------------------------------------
// Alarm
// ---------------------------------------------------------------------------

/// Active buzzer. HIGH = sounding.
pub const BUZZER_GPIO: PinId = PinId(24);
