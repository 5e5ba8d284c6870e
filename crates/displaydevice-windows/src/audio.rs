use std::cell::Cell;

use displaydevice_core::AudioContextApi;
use log::warn;
use parking_lot::Mutex;
use windows::Win32::Media::Audio::{
    eConsole, eRender, IAudioClient, IMMDeviceEnumerator, MMDeviceEnumerator,
    AUDCLNT_SHAREMODE_SHARED, AUDCLNT_STREAMFLAGS_LOOPBACK,
};
use windows::Win32::System::Com::{CoCreateInstance, CoInitializeEx, CLSCTX_ALL, COINIT_APARTMENTTHREADED};

thread_local! {
    /// WASAPI enumeration and activation need the calling thread's apartment
    /// initialized exactly once; a second `CoInitializeEx` on the same thread
    /// is harmless but wasteful, so this tracks whether this thread already
    /// did it.
    static COM_READY: Cell<bool> = const { Cell::new(false) };
}

/// Initializes COM on the current thread if it hasn't been already. Never
/// uninitializes — the loopback client and any COM pointers it hands out
/// are expected to outlive the calling thread's lifetime in this process.
fn ensure_com_ready_for_loopback() {
    COM_READY.with(|ready| {
        if ready.get() {
            return;
        }
        // S_FALSE means COM was already initialized on this thread by someone
        // else, which is fine; anything else failing is worth logging.
        if let Err(err) = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) }.ok() {
            if err.code() != windows::Win32::Foundation::S_FALSE {
                warn!("CoInitializeEx failed: {}", err);
            }
        }
        ready.set(true);
    });
}

/// Keeps the default render endpoint's audio client open in loopback mode
/// for the duration of a topology change, so Windows doesn't tear down and
/// recreate the active audio session while the primary device is swapped.
pub struct WasapiAudioContextApi {
    client: Mutex<Option<IAudioClient>>,
}

impl WasapiAudioContextApi {
    pub fn new() -> Self {
        ensure_com_ready_for_loopback();
        Self { client: Mutex::new(None) }
    }

    fn open_loopback_client(&self) -> windows::core::Result<IAudioClient> {
        unsafe {
            let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)?;
            let device = enumerator.GetDefaultAudioEndpoint(eRender, eConsole)?;
            let client: IAudioClient = device.Activate(CLSCTX_ALL, None)?;
            let format = client.GetMixFormat()?;
            client.Initialize(AUDCLNT_SHAREMODE_SHARED, AUDCLNT_STREAMFLAGS_LOOPBACK, 0, 0, format, None)?;
            client.Start()?;
            Ok(client)
        }
    }
}

impl Default for WasapiAudioContextApi {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioContextApi for WasapiAudioContextApi {
    fn capture(&self) -> bool {
        let mut client = self.client.lock();
        if client.is_some() {
            return true;
        }
        match self.open_loopback_client() {
            Ok(opened) => {
                *client = Some(opened);
                true
            }
            Err(err) => {
                warn!("failed to open loopback audio client: {}", err);
                false
            }
        }
    }

    fn release(&self) {
        let mut client = self.client.lock();
        if let Some(active) = client.take() {
            unsafe {
                if let Err(err) = active.Stop() {
                    warn!("failed to stop loopback audio client: {}", err);
                }
            }
        }
    }

    fn is_captured(&self) -> bool {
        self.client.lock().is_some()
    }
}

unsafe impl Send for WasapiAudioContextApi {}
unsafe impl Sync for WasapiAudioContextApi {}
