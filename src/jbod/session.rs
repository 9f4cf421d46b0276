use super::{JbodError, Result};

/// 卷的会话状态: 是否已 mount, 是否可写
///
/// ```text
/// Unmounted --mount--> Mounted --unmount--> Unmounted
///                      ReadOnly <--grant/revoke--> Writable
/// ```
///
/// unmount 会同时收回写权限.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Session {
    mounted: bool,
    writable: bool,
}

impl Session {
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn is_writable(&self) -> bool {
        self.mounted && self.writable
    }

    pub fn mount(&mut self) -> Result<()> {
        if self.mounted {
            return Err(JbodError::AlreadyMounted);
        }
        self.mounted = true;
        Ok(())
    }

    pub fn unmount(&mut self) -> Result<()> {
        self.check_mounted()?;
        *self = Self::default();
        Ok(())
    }

    pub fn grant_write(&mut self) -> Result<()> {
        self.check_mounted()?;
        self.writable = true;
        Ok(())
    }

    pub fn revoke_write(&mut self) -> Result<()> {
        self.check_mounted()?;
        self.writable = false;
        Ok(())
    }

    /// 读请求的前置条件
    pub fn check_mounted(&self) -> Result<()> {
        if self.mounted {
            Ok(())
        } else {
            Err(JbodError::NotMounted)
        }
    }

    /// 写请求的前置条件
    pub fn check_writable(&self) -> Result<()> {
        self.check_mounted()?;
        if self.writable {
            Ok(())
        } else {
            Err(JbodError::PermissionDenied)
        }
    }
}
