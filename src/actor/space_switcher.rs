//! Moves the active desktop focus to a requested space.
//!
//! Three strategies: synthesizing the space shortcut key press (primary),
//! delegating to an external window manager tool when one is installed, and
//! foregrounding the owner of a fullscreen space (fallback for spaces that
//! have no shortcut slot). A worker task exclusively owns the one-time
//! permission-prompt flag and the cached resolved-tool path; callers talk
//! to it over a channel, so concurrent callers can neither double-prompt
//! nor race the resolution.
//!
//! Every operation is best effort: failures come back as `false` plus a log
//! line, and no retries happen here; retry policy belongs to the caller.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::actor;
use crate::sys::event::InputEventSink;
use crate::sys::hotkey::{HotKeyProvider, MAX_SUPPORTED_SPACE, SPACE_HOTKEY_BASE};
use crate::sys::permission::PermissionGate;
use crate::sys::process::{self, ToolFailure};
use crate::sys::provider::SpaceDataProvider;
use crate::sys::window_server::WindowServer;

const TOOL_NAME: &str = "yabai";
const TOOL_SEARCH_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];
const TOOL_TIMEOUT: Duration = Duration::from_secs(3);

/// Everything the switcher needs from the OS, injected so strategies can be
/// exercised against test doubles.
pub struct SwitcherDeps {
    pub hotkeys: Box<dyn HotKeyProvider>,
    pub input: Box<dyn InputEventSink>,
    pub permissions: Box<dyn PermissionGate>,
    pub window_server: Box<dyn WindowServer>,
    pub provider: Arc<dyn SpaceDataProvider>,
    /// Overrides tool discovery when set; still validated as executable.
    pub tool_override: Option<PathBuf>,
}

enum Request {
    SwitchToSpace { ordinal: usize, reply: oneshot::Sender<bool> },
    SwitchViaInputSynthesis { ordinal: usize, reply: oneshot::Sender<bool> },
    SwitchViaExternalTool { ordinal: usize, reply: oneshot::Sender<bool> },
    ActivateOwnerOfSpace { space_id: u64, reply: oneshot::Sender<bool> },
}

/// Handle to the switcher worker. Cheap to clone; all clones share the one
/// serialized owner.
#[derive(Clone)]
pub struct SpaceSwitcher {
    requests_tx: actor::Sender<Request>,
}

impl SpaceSwitcher {
    pub fn spawn(deps: SwitcherDeps) -> Self {
        let (requests_tx, requests_rx) = actor::channel();
        let worker = Worker { deps, prompted: false, tool: None };
        tokio::spawn(worker.run(requests_rx));
        SpaceSwitcher { requests_tx }
    }

    /// Switch using the best available strategy: input synthesis first,
    /// falling back to the external tool when one is installed.
    pub async fn switch_to_space(&self, ordinal: usize) -> bool {
        self.request(|reply| Request::SwitchToSpace { ordinal, reply }).await
    }

    pub async fn switch_via_input_synthesis(&self, ordinal: usize) -> bool {
        self.request(|reply| Request::SwitchViaInputSynthesis { ordinal, reply }).await
    }

    pub async fn switch_via_external_tool(&self, ordinal: usize) -> bool {
        self.request(|reply| Request::SwitchViaExternalTool { ordinal, reply }).await
    }

    /// Foreground a process owning a window on the given fullscreen space;
    /// the OS follows the newly active process onto its space.
    pub async fn activate_owner_of_space(&self, space_id: u64) -> bool {
        self.request(|reply| Request::ActivateOwnerOfSpace { space_id, reply }).await
    }

    async fn request(&self, make: impl FnOnce(oneshot::Sender<bool>) -> Request) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.requests_tx.send(make(reply_tx)).is_err() {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }
}

struct Worker {
    deps: SwitcherDeps,
    /// Set once the consent prompt has been claimed for this process.
    prompted: bool,
    /// Resolve-once cache; `Some(None)` records that no tool is installed.
    tool: Option<Option<PathBuf>>,
}

impl Worker {
    async fn run(mut self, mut requests_rx: actor::Receiver<Request>) {
        while let Some(request) = requests_rx.recv().await {
            match request {
                Request::SwitchToSpace { ordinal, reply } => {
                    let _ = reply.send(self.switch_to_space(ordinal).await);
                }
                Request::SwitchViaInputSynthesis { ordinal, reply } => {
                    let _ = reply.send(self.switch_via_input_synthesis(ordinal));
                }
                Request::SwitchViaExternalTool { ordinal, reply } => {
                    let _ = reply.send(self.switch_via_external_tool(ordinal).await);
                }
                Request::ActivateOwnerOfSpace { space_id, reply } => {
                    let _ = reply.send(self.activate_owner_of_space(space_id));
                }
            }
        }
    }

    async fn switch_to_space(&mut self, ordinal: usize) -> bool {
        if self.switch_via_input_synthesis(ordinal) {
            return true;
        }
        if self.resolve_tool().is_some() {
            return self.switch_via_external_tool(ordinal).await;
        }
        warn!(ordinal, "no switching strategy succeeded");
        false
    }

    fn switch_via_input_synthesis(&mut self, ordinal: usize) -> bool {
        if !self.deps.hotkeys.available() {
            warn!("symbolic hot key API is unavailable on this system");
            return false;
        }
        if !self.deps.permissions.is_trusted() {
            if !self.prompted {
                self.prompted = true;
                debug!("requesting accessibility trust");
                self.deps.permissions.reset_stale_grant();
                self.deps.permissions.request_trust();
            }
            warn!("input synthesis requires accessibility trust; re-invoke after granting");
            return false;
        }
        if !(1..=MAX_SUPPORTED_SPACE).contains(&ordinal) {
            warn!(ordinal, max = MAX_SUPPORTED_SPACE, "space ordinal out of range");
            return false;
        }

        let index = SPACE_HOTKEY_BASE + (ordinal as u32 - 1);
        let Some(binding) = self.deps.hotkeys.value_for(index) else {
            warn!(index, "no hot key binding for space");
            return false;
        };
        if !self.deps.hotkeys.is_enabled(index) {
            debug!(index, "enabling disabled space hot key");
            self.deps.hotkeys.set_enabled(index, true);
        }
        // Fire and forget: the window manager intercepts the pair and
        // performs the switch; success is not independently confirmed.
        self.deps.input.post_key_down(binding.key_code, binding.modifier_flags);
        self.deps.input.post_key_up(binding.key_code);
        debug!(ordinal, key_code = binding.key_code, "synthesized space shortcut");
        true
    }

    async fn switch_via_external_tool(&mut self, ordinal: usize) -> bool {
        let Some(tool) = self.resolve_tool() else {
            warn!("no external switch tool installed");
            return false;
        };
        // Read-only preflight before asking the tool to move focus.
        if !run_tool(&tool, &["-m", "query", "--spaces"]).await {
            return false;
        }
        run_tool(&tool, &["-m", "space", "--focus", &ordinal.to_string()]).await
    }

    fn resolve_tool(&mut self) -> Option<PathBuf> {
        if let Some(cached) = &self.tool {
            return cached.clone();
        }
        let resolved = match &self.deps.tool_override {
            Some(path) if process::is_executable(path) => Some(path.clone()),
            Some(path) => {
                warn!(path = %path.display(), "configured tool is not executable");
                None
            }
            None => process::find_executable(TOOL_NAME, TOOL_SEARCH_DIRS),
        };
        match &resolved {
            Some(path) => debug!(path = %path.display(), "resolved external switch tool"),
            None => debug!("external switch tool not installed"),
        }
        self.tool = Some(resolved.clone());
        resolved
    }

    fn activate_owner_of_space(&mut self, space_id: u64) -> bool {
        let visible = self.deps.provider.spaces_with_visible_content(&[space_id]);
        if !visible.contains(&space_id) {
            warn!(space_id, "target space has no visible content to activate");
            return false;
        }

        let candidates: Vec<_> = self
            .deps
            .window_server
            .onscreen_windows()
            .into_iter()
            .filter(|window| window.is_ordinary())
            .collect();
        if candidates.is_empty() {
            warn!(space_id, "no ordinary on-screen windows to activate");
            return false;
        }

        // One membership query for the whole batch; per-window queries do
        // not scale under heavy window counts.
        let window_ids: Vec<u32> = candidates.iter().map(|window| window.window_id).collect();
        let spaces = self.deps.provider.spaces_for_windows(&window_ids);
        let owner_pid = candidates
            .iter()
            .zip(spaces.iter())
            .find(|&(_, &space)| space == space_id)
            .map(|(window, _)| window.owner_pid);
        let Some(pid) = owner_pid else {
            warn!(space_id, "no on-screen window lies on the target space");
            return false;
        };

        if self.deps.window_server.activate_application(pid) {
            debug!(space_id, pid, "activated owner of target space");
            true
        } else {
            warn!(space_id, pid, "could not activate owner of target space");
            false
        }
    }
}

async fn run_tool(tool: &std::path::Path, args: &[&str]) -> bool {
    match process::run_with_timeout(tool, args, TOOL_TIMEOUT).await {
        Ok(()) => true,
        Err(failure @ ToolFailure::Timeout { .. }) => {
            warn!(%failure, "external tool timed out and was terminated");
            false
        }
        Err(failure) => {
            warn!(%failure, "external tool invocation failed");
            false
        }
    }
}
