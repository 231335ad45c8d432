//! Verify Responder
//!
//! Watches the chat area of a game window for `/verify NNNN` prompts and
//! types the reply into whatever window has keyboard focus. Controlled with
//! global hotkeys; the console window shows the log.

// Only the Windows entry point drives the library modules
#![cfg_attr(not(windows), allow(dead_code))]

mod capture;
mod config;
mod diagnostics;
mod error;
mod input;
mod logging;
mod monitor;
mod ocr;
mod paths;

pub use logging::log;

#[cfg(not(windows))]
fn main() -> anyhow::Result<()> {
    Err(anyhow::anyhow!(
        "verify-responder captures the screen and injects keys through Win32 and only runs on Windows"
    ))
}

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    app::run()
}

#[cfg(windows)]
mod app {
    use anyhow::{anyhow, Result};
    use std::time::Duration;

    use windows::core::w;
    use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        RegisterHotKey, UnregisterHotKey, MOD_CONTROL, MOD_NOREPEAT, MOD_SHIFT, VIRTUAL_KEY,
        VK_F10, VK_F11, VK_F12, VK_F9,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW, KillTimer,
        PostQuitMessage, RegisterClassW, SetTimer, TranslateMessage, CW_USEDEFAULT, MSG,
        WM_DESTROY, WM_HOTKEY, WM_TIMER, WNDCLASSW, WS_OVERLAPPEDWINDOW,
    };

    use crate::capture::{self, CaptureRegion, GdiScreen};
    use crate::config::{self, AppConfig, ConfigWatcher, SharedParameters};
    use crate::diagnostics;
    use crate::input::SendInputKeyboard;
    use crate::logging::{self, log_channel, LogReceiver, LogSender};
    use crate::monitor::{MonitorBackends, MonitorController, MonitorState};
    use crate::ocr::{self, TesseractCli};
    use crate::{log, paths};

    const HOTKEY_START: i32 = 1;
    const HOTKEY_STOP: i32 = 2;
    const HOTKEY_TEST_OCR: i32 = 3;
    const HOTKEY_EXIT: i32 = 4;

    const HOTKEYS: [(i32, VIRTUAL_KEY, &str); 4] = [
        (HOTKEY_START, VK_F9, "start monitoring"),
        (HOTKEY_STOP, VK_F10, "stop monitoring"),
        (HOTKEY_TEST_OCR, VK_F11, "test OCR and save preview"),
        (HOTKEY_EXIT, VK_F12, "exit"),
    ];

    /// Log drain and config check period.
    const POLL_TIMER_ID: usize = 1;
    const POLL_INTERVAL: Duration = Duration::from_millis(120);

    /// Everything the message loop acts on.
    struct App {
        config: AppConfig,
        fallback_region: CaptureRegion,
        params: SharedParameters,
        controller: MonitorController,
        status_tx: LogSender,
        status: LogReceiver,
        watcher: ConfigWatcher,
    }

    pub fn run() -> Result<()> {
        logging::install_panic_hook();
        paths::ensure_directories()?;
        log("Verify Responder starting");

        let config_path = paths::get_config_path();
        let config = config::load_config(&config_path);

        let (screen_width, screen_height) = capture::primary_screen_size();
        let fallback_region = capture::default_region(screen_width, screen_height);

        let params = match config.to_parameters(fallback_region) {
            Ok(params) => params,
            Err(e) => {
                log(&format!("{:#}. Using default monitor settings.", e));
                AppConfig::default().to_parameters(fallback_region)?
            }
        };
        log(&format!("Monitor settings: {}", params));

        if let Err(e) = ocr::locate_tesseract(config.tesseract_path.as_deref()) {
            log(&format!("Warning: Tesseract not available: {:#}", e));
            log("Install Tesseract OCR or set tesseract_path in config.json. Monitoring cannot start without it.");
        }

        let params = SharedParameters::new(params);
        let (status_tx, status) = log_channel();
        let controller =
            MonitorController::new(params.clone(), status_tx.clone(), backend_factory(&config));

        let mut app = App {
            config,
            fallback_region,
            params,
            controller,
            status_tx,
            status,
            watcher: ConfigWatcher::new(config_path),
        };

        let hwnd = create_message_window()?;
        register_hotkeys(hwnd)?;
        unsafe {
            if SetTimer(hwnd, POLL_TIMER_ID, POLL_INTERVAL.as_millis() as u32, None) == 0 {
                return Err(anyhow!("Failed to create poll timer"));
            }
        }

        if app.config.autostart {
            app.start_monitoring();
        } else {
            log("Monitoring is stopped. Press Ctrl+Shift+F9 to start.");
        }

        let mut msg = MSG::default();
        unsafe {
            while GetMessageW(&mut msg, HWND::default(), 0, 0).as_bool() {
                match msg.message {
                    WM_HOTKEY => app.on_hotkey(msg.wParam.0 as i32),
                    WM_TIMER if msg.wParam.0 == POLL_TIMER_ID => app.on_timer(),
                    _ => {}
                }
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        app.controller.stop();
        app.forward_status();

        unsafe {
            let _ = KillTimer(hwnd, POLL_TIMER_ID);
            for (id, _, _) in HOTKEYS {
                let _ = UnregisterHotKey(hwnd, id);
            }
            let _ = DestroyWindow(hwnd);
        }

        log("Verify Responder exited");
        Ok(())
    }

    /// Backends are built on every start, so a Tesseract installed while
    /// the app is running is picked up by the next start.
    fn backend_factory(config: &AppConfig) -> Box<dyn FnMut() -> Result<MonitorBackends>> {
        let tesseract_path = config.tesseract_path.clone();
        let timeout = config.ocr_timeout();
        Box::new(move || -> Result<MonitorBackends> {
            let tesseract = ocr::locate_tesseract(tesseract_path.as_deref())?;
            Ok(MonitorBackends {
                screen: Box::new(GdiScreen),
                recognizer: Box::new(TesseractCli::new(tesseract, timeout)),
                keyboard: Box::new(SendInputKeyboard),
            })
        })
    }

    impl App {
        fn on_hotkey(&mut self, id: i32) {
            match id {
                HOTKEY_START => self.start_monitoring(),
                HOTKEY_STOP => {
                    if !self.controller.stop() {
                        log("Monitoring is not running");
                    }
                }
                HOTKEY_TEST_OCR => self.test_ocr(),
                HOTKEY_EXIT => {
                    log("Exit requested");
                    unsafe { PostQuitMessage(0) };
                }
                _ => {}
            }
            self.forward_status();
        }

        fn on_timer(&mut self) {
            self.forward_status();
            self.reload_config();
        }

        fn start_monitoring(&mut self) {
            match self.controller.start() {
                Ok(true) => {}
                Ok(false) => log("Monitoring is already running"),
                Err(e) => log(&format!("Failed to start monitoring: {:#}", e)),
            }
        }

        /// Copies queued worker status lines to the application log.
        fn forward_status(&self) {
            for event in self.status.drain() {
                log(&event.message);
            }
        }

        fn reload_config(&mut self) {
            let Some(loaded) = self.watcher.poll() else {
                return;
            };

            let config = match loaded {
                Ok(config) => config,
                Err(e) => {
                    log(&format!("Config change ignored: {:#}", e));
                    return;
                }
            };

            match config.to_parameters(self.fallback_region) {
                Ok(params) => {
                    log(&format!("Config reloaded: {}", params));
                    self.params.publish(params);
                    if config.tesseract_path != self.config.tesseract_path
                        || config.ocr_timeout_ms != self.config.ocr_timeout_ms
                    {
                        self.rebuild_controller(&config);
                    }
                    self.config = config;
                }
                Err(e) => log(&format!("Config change ignored: {:#}", e)),
            }
        }

        /// OCR engine settings are bound when the worker starts; a running
        /// monitor is restarted to pick them up.
        fn rebuild_controller(&mut self, config: &AppConfig) {
            let was_running = self.controller.state() == MonitorState::Running;
            self.controller.stop();
            self.controller = MonitorController::new(
                self.params.clone(),
                self.status_tx.clone(),
                backend_factory(config),
            );

            if was_running {
                log("OCR settings changed, restarting monitor");
                self.start_monitoring();
            }
        }

        fn test_ocr(&self) {
            log("Test OCR requested");
            let tesseract = match ocr::locate_tesseract(self.config.tesseract_path.as_deref()) {
                Ok(tesseract) => tesseract,
                Err(e) => {
                    log(&format!("Test OCR failed: {:#}", e));
                    return;
                }
            };

            let recognizer = TesseractCli::new(tesseract, self.config.ocr_timeout());
            let region = self.params.snapshot().region;
            match diagnostics::run_ocr_test(
                &mut GdiScreen,
                &recognizer,
                &region,
                &paths::get_debug_dir(),
            ) {
                Ok(report) => {
                    for line in report.log_lines() {
                        log(&line);
                    }
                }
                Err(e) => log(&format!("Test OCR failed: {:#}", e)),
            }
        }
    }

    fn register_hotkeys(hwnd: HWND) -> Result<()> {
        for (id, vk, action) in HOTKEYS {
            unsafe {
                RegisterHotKey(hwnd, id, MOD_CONTROL | MOD_SHIFT | MOD_NOREPEAT, vk.0 as u32)
                    .map_err(|e| anyhow!("Failed to register hotkey for {}: {}", action, e))?;
            }
            log(&format!(
                "Hotkey: Ctrl+Shift+F{} ({})",
                vk.0 - VK_F9.0 + 9,
                action
            ));
        }
        Ok(())
    }

    fn create_message_window() -> Result<HWND> {
        unsafe {
            let hinstance = GetModuleHandleW(None)?;
            let class_name = w!("VerifyResponderClass");

            let wc = WNDCLASSW {
                lpfnWndProc: Some(window_proc),
                hInstance: hinstance.into(),
                lpszClassName: class_name,
                ..Default::default()
            };

            let atom = RegisterClassW(&wc);
            if atom == 0 {
                return Err(anyhow!("Failed to register window class"));
            }

            let hwnd = CreateWindowExW(
                Default::default(),
                class_name,
                w!("Verify Responder"),
                WS_OVERLAPPEDWINDOW,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                None,
                None,
                hinstance,
                None,
            )?;

            Ok(hwnd)
        }
    }

    unsafe extern "system" fn window_proc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        unsafe {
            match msg {
                WM_DESTROY => {
                    PostQuitMessage(0);
                    LRESULT(0)
                }
                _ => DefWindowProcW(hwnd, msg, wparam, lparam),
            }
        }
    }
}
