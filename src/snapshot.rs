//! Point-in-time directory of virtual machines

use crate::provider::{VmInfo, VmProvider};
use crate::state::VmState;

/// An ordered list of VMs captured in one enumeration pass.
///
/// Rebuilt, never mutated: each refresh discards the previous set. Entries are
/// sorted case-insensitively by name, which fixes menu order and numeric
/// accelerator assignment.
#[derive(Debug, Default)]
pub struct VmSnapshot {
    entries: Vec<VmInfo>,
}

impl VmSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(mut entries: Vec<VmInfo>) -> Self {
        entries.sort_by_cached_key(|e| e.name.to_lowercase());
        Self { entries }
    }

    /// Query the provider for the current VM directory.
    ///
    /// A failed enumeration yields an empty snapshot. The tray icon must stay
    /// resident whether or not the virtualization service is reachable.
    pub fn refresh(provider: &dyn VmProvider) -> Self {
        match provider.enumerate() {
            Ok(entries) => Self::from_entries(entries),
            Err(error) => {
                tracing::debug!(%error, "VM enumeration failed, using empty snapshot");
                Self::empty()
            }
        }
    }

    pub fn entries(&self) -> &[VmInfo] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&VmInfo> {
        self.entries.get(index)
    }

    pub fn state_of(&self, name: &str) -> Option<VmState> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockVmProvider;
    use crate::Error;

    #[test]
    fn test_ordering_is_case_insensitive() {
        let snapshot = VmSnapshot::from_entries(vec![
            VmInfo::new("beta", VmState::Running),
            VmInfo::new("Alpha", VmState::Stopped),
            VmInfo::new("gamma", VmState::Saved),
        ]);

        let names: Vec<_> = snapshot.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_refresh_sorts_provider_output() {
        let mut provider = MockVmProvider::new();
        provider.expect_enumerate().returning(|| {
            Ok(vec![
                VmInfo::new("zeta", VmState::Running),
                VmInfo::new("Apex", VmState::Stopped),
            ])
        });

        let snapshot = VmSnapshot::refresh(&provider);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.entries()[0].name, "Apex");
    }

    #[test]
    fn test_failed_enumeration_yields_empty_snapshot() {
        let mut provider = MockVmProvider::new();
        provider
            .expect_enumerate()
            .returning(|| Err(Error::Wmi("service unavailable".into())));

        let snapshot = VmSnapshot::refresh(&provider);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_state_lookup_by_name() {
        let snapshot = VmSnapshot::from_entries(vec![VmInfo::new("dev", VmState::Paused)]);
        assert_eq!(snapshot.state_of("dev"), Some(VmState::Paused));
        assert_eq!(snapshot.state_of("missing"), None);
    }
}
