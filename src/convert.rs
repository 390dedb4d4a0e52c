/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! String conversion helpers for the engine's wide-string interfaces

use log::warn;

/// Widen an ASCII string into UTF-16 code units, one unit per byte
pub fn ascii_to_utf16(s: &str) -> Vec<u16> {
    s.bytes().map(u16::from).collect()
}

/// Narrow UTF-16 code units to UTF-8 by truncating each unit to its low
/// byte; a truncated byte with the high bit set becomes `?`.
///
/// This is deliberately lossy, including the truncation step: U+4E2D comes
/// out as `-` (0x2D), not `?`. The conversion shipped as a placeholder and
/// downstream consumers of the produced strings may rely on the exact
/// mapping, so it is preserved as-is rather than replaced with a real
/// transcoder.
pub fn utf16_to_utf8_lossy(units: &[u16]) -> String {
    let mut out = String::with_capacity(units.len());
    let mut lossy = 0usize;
    for &unit in units {
        let byte = unit as u8;
        if byte & 0x80 != 0 {
            out.push('?');
            lossy += 1;
        } else {
            out.push(byte as char);
        }
    }
    if lossy > 0 {
        warn!("lossy UTF-16 conversion replaced {} code units", lossy);
    }
    out
}
