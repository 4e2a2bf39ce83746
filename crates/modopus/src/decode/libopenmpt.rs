//! Decode engine over libopenmpt.
//!
//! Every string libopenmpt hands back is copied into an owned `String` and
//! released with `openmpt_free_string` straight away.

use std::ffi::{CStr, CString, c_char, c_int};
use std::ptr;

use openmpt_sys as sys;

use super::{DecodeEngine, ModuleDecoder, RenderParam, split_list};
use crate::error::DecodeError;

const RENDER_MASTERGAIN_MILLIBEL: c_int = 1;
const RENDER_INTERPOLATIONFILTER_LENGTH: c_int = 3;

/// Rendering past the analysed song length (times plays) stops after this much slack.
const OVERRUN_SECONDS: f64 = 1.0;

/// Copy and free a string returned by libopenmpt. `None` for NULL.
///
/// # Safety
/// `raw` must be NULL or a string allocated by libopenmpt.
unsafe fn take_string(raw: *const c_char) -> Option<String> {
    if raw.is_null() {
        return None;
    }
    // SAFETY: libopenmpt returns NUL-terminated strings it owns until freed.
    let owned = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
    unsafe { sys::openmpt_free_string(raw) };
    Some(owned)
}

/// Most frames a song of `duration` seconds may render across `plays` plays.
fn frame_limit(duration: f64, plays: u64, sample_rate: u32) -> u64 {
    let seconds = duration.max(0.0) * plays as f64 + OVERRUN_SECONDS;
    (seconds * f64::from(sample_rate)).ceil() as u64
}

/// Decode engine backed by libopenmpt; supports every format the library does.
#[derive(Clone, Copy, Debug, Default)]
pub struct LibOpenMptEngine;

impl DecodeEngine for LibOpenMptEngine {
    fn open(&self, data: &[u8]) -> Result<Box<dyn ModuleDecoder>, DecodeError> {
        let mut error: c_int = 0;
        let mut message: *const c_char = ptr::null();
        // SAFETY: the buffer outlives the call; libopenmpt copies what it keeps.
        let handle = unsafe {
            sys::openmpt_module_create_from_memory2(
                data.as_ptr().cast(),
                data.len() as _,
                None,
                ptr::null_mut(),
                None,
                ptr::null_mut(),
                &mut error,
                &mut message,
                ptr::null(),
            )
        };
        let message = unsafe { take_string(message) };
        if handle.is_null() {
            return Err(DecodeError::Format(
                message.unwrap_or_else(|| format!("libopenmpt error {error}")),
            ));
        }
        Ok(Box::new(OpenMptDecoder {
            handle,
            plays: 1,
            rendered: 0,
            limit: None,
        }))
    }

    fn is_extension_supported(&self, ext: &str) -> bool {
        let Ok(ext) = CString::new(ext) else {
            return false;
        };
        // SAFETY: `ext` is a valid NUL-terminated string for the call.
        unsafe { sys::openmpt_is_extension_supported(ext.as_ptr()) != 0 }
    }

    fn supported_extensions(&self) -> Vec<String> {
        // SAFETY: returns a library-allocated list or NULL.
        let list = unsafe { take_string(sys::openmpt_get_supported_extensions()) };
        list.as_deref().map(split_list).unwrap_or_default()
    }
}

/// An open libopenmpt module; destroyed on drop.
///
/// Output is capped at the analysed song length so a module whose pattern
/// loops never let playback reach the end still finishes.
struct OpenMptDecoder {
    handle: *mut sys::openmpt_module,
    plays: u64,
    rendered: u64,
    limit: Option<u64>,
}

impl OpenMptDecoder {
    fn duration_seconds(&self) -> f64 {
        // SAFETY: valid handle for the lifetime of `self`.
        unsafe { sys::openmpt_module_get_duration_seconds(self.handle) }
    }
}

impl Drop for OpenMptDecoder {
    fn drop(&mut self) {
        // SAFETY: `handle` came from a successful create and is destroyed once.
        unsafe { sys::openmpt_module_destroy(self.handle) };
    }
}

impl ModuleDecoder for OpenMptDecoder {
    fn set_repeat_count(&mut self, count: u32) -> Result<(), DecodeError> {
        let rejected = || DecodeError::Rejected {
            param: "repeat count",
            value: i64::from(count),
        };
        let value = i32::try_from(count).map_err(|_| rejected())?;
        // SAFETY: valid handle for the lifetime of `self`.
        if unsafe { sys::openmpt_module_set_repeat_count(self.handle, value) } == 0 {
            return Err(rejected());
        }
        self.plays = u64::from(count) + 1;
        self.limit = None;
        Ok(())
    }

    fn set_render_param(&mut self, param: RenderParam) -> Result<(), DecodeError> {
        let (id, value) = match param {
            RenderParam::InterpolationFilterLength(taps) => (
                RENDER_INTERPOLATIONFILTER_LENGTH,
                i32::try_from(taps).unwrap_or(i32::MAX),
            ),
            RenderParam::MasterGainMillibel(millibel) => (RENDER_MASTERGAIN_MILLIBEL, millibel),
        };
        // SAFETY: valid handle for the lifetime of `self`.
        if unsafe { sys::openmpt_module_set_render_param(self.handle, id, value) } == 0 {
            return Err(DecodeError::Rejected {
                param: param.name(),
                value: i64::from(value),
            });
        }
        Ok(())
    }

    fn read_interleaved_stereo(&mut self, sample_rate: u32, buffer: &mut [f32]) -> usize {
        let Ok(rate) = i32::try_from(sample_rate) else {
            return 0;
        };
        let limit = match self.limit {
            Some(limit) => limit,
            None => {
                let limit = frame_limit(self.duration_seconds(), self.plays, sample_rate);
                self.limit = Some(limit);
                limit
            }
        };
        let room = limit.saturating_sub(self.rendered);
        if room == 0 {
            tracing::warn!(
                frames = self.rendered,
                "module kept playing past its length; stopped"
            );
            return 0;
        }
        let count = (buffer.len() / 2).min(usize::try_from(room).unwrap_or(usize::MAX));
        // SAFETY: libopenmpt writes at most `count` stereo frames into the buffer.
        let frames = unsafe {
            sys::openmpt_module_read_interleaved_float_stereo(
                self.handle,
                rate,
                count as _,
                buffer.as_mut_ptr(),
            )
        } as usize;
        self.rendered += frames as u64;
        frames
    }

    fn metadata_keys(&self) -> Vec<String> {
        // SAFETY: valid handle; the returned list is freed by `take_string`.
        let keys = unsafe { take_string(sys::openmpt_module_get_metadata_keys(self.handle)) };
        keys.as_deref().map(split_list).unwrap_or_default()
    }

    fn metadata(&self, key: &str) -> Result<Option<String>, DecodeError> {
        let c_key = CString::new(key).map_err(|_| DecodeError::Metadata(key.to_string()))?;
        // SAFETY: valid handle and NUL-terminated key.
        let value =
            unsafe { take_string(sys::openmpt_module_get_metadata(self.handle, c_key.as_ptr())) };
        value
            .map(Some)
            .ok_or_else(|| DecodeError::Metadata(key.to_string()))
    }

    fn subsong_names(&self) -> Vec<String> {
        // SAFETY: valid handle; indices stay below the reported count.
        let count = unsafe { sys::openmpt_module_get_num_subsongs(self.handle) }.max(0);
        (0..count)
            .map(|index| {
                unsafe { take_string(sys::openmpt_module_get_subsong_name(self.handle, index)) }
                    .unwrap_or_default()
            })
            .collect()
    }
}
