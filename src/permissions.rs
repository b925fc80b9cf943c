//! Runtime permission checks for the camera and microphone.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    Camera,
    Microphone,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Camera => f.write_str("camera"),
            Permission::Microphone => f.write_str("microphone"),
        }
    }
}

pub trait PermissionChecker {
    fn granted(&self, permission: Permission) -> bool;
}

/// Permission checks against the local devices.
///
/// The camera is granted when the device node can be opened (synthetic devices
/// always are). The microphone is granted when the voice transcript source can be
/// found, or when voice input is not configured at all. The transcript source may
/// be a FIFO, so it is never opened here.
pub struct DevicePermissions {
    camera_device: String,
    voice_input: Option<PathBuf>,
}

impl DevicePermissions {
    pub fn new(camera_device: &str, voice_input: Option<&Path>) -> Self {
        Self {
            camera_device: camera_device.to_string(),
            voice_input: voice_input.map(Path::to_path_buf),
        }
    }
}

impl PermissionChecker for DevicePermissions {
    fn granted(&self, permission: Permission) -> bool {
        match permission {
            Permission::Camera => {
                self.camera_device.starts_with("stub://")
                    || File::open(&self.camera_device).is_ok()
            }
            Permission::Microphone => match &self.voice_input {
                None => true,
                Some(path) => path.metadata().is_ok(),
            },
        }
    }
}

/// Required permissions the pipeline waits on.
pub struct PermissionGate<C: PermissionChecker> {
    checker: C,
}

impl<C: PermissionChecker> PermissionGate<C> {
    pub const REQUIRED: [Permission; 2] = [Permission::Camera, Permission::Microphone];

    pub fn new(checker: C) -> Self {
        Self { checker }
    }

    pub fn missing(&self) -> Vec<Permission> {
        Self::REQUIRED
            .into_iter()
            .filter(|permission| !self.checker.granted(*permission))
            .collect()
    }

    pub fn all_granted(&self) -> bool {
        self.missing().is_empty()
    }

    /// Toast text for missing permissions, if any.
    pub fn denial_message(&self) -> Option<String> {
        let missing = self.missing();
        if missing.is_empty() {
            return None;
        }
        let names: Vec<String> = missing.iter().map(Permission::to_string).collect();
        Some(format!("Permission required: {}", names.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Fixed {
        camera: Cell<bool>,
        microphone: bool,
    }

    impl PermissionChecker for Fixed {
        fn granted(&self, permission: Permission) -> bool {
            match permission {
                Permission::Camera => self.camera.get(),
                Permission::Microphone => self.microphone,
            }
        }
    }

    #[test]
    fn reports_missing_permissions() {
        let gate = PermissionGate::new(Fixed {
            camera: Cell::new(false),
            microphone: false,
        });
        assert_eq!(gate.missing(), vec![Permission::Camera, Permission::Microphone]);
        assert_eq!(
            gate.denial_message().as_deref(),
            Some("Permission required: camera, microphone")
        );
        gate.checker.camera.set(true);
        assert_eq!(gate.missing(), vec![Permission::Microphone]);
    }

    #[test]
    fn stub_camera_and_unconfigured_voice_are_granted() {
        let gate = PermissionGate::new(DevicePermissions::new("stub://rear_camera", None));
        assert!(gate.all_granted());
        assert!(gate.denial_message().is_none());
    }

    #[test]
    fn missing_device_node_is_denied() {
        let voice = tempfile::NamedTempFile::new().unwrap();
        let gate = PermissionGate::new(DevicePermissions::new(
            "/dev/does-not-exist-video9",
            Some(voice.path()),
        ));
        assert_eq!(gate.missing(), vec![Permission::Camera]);
    }
}
