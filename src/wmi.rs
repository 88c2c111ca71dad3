//! WMI-backed VM provider
//!
//! Talks to the Hyper-V virtualization namespace (`ROOT\Virtualization\V2`)
//! over COM/WMI: enumerates `Msvm_ComputerSystem` instances, reads typed
//! properties, and issues `RequestStateChange` / `InitiateShutdown` through
//! `ExecMethod`. Property reads fail cleanly; an absent or wrong-typed value
//! skips that VM rather than aborting the whole enumeration.

use windows::core::{BSTR, HSTRING, PCWSTR, VARIANT};
use windows::Win32::Foundation::RPC_E_TOO_LATE;
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoInitializeSecurity, CoSetProxyBlanket,
    CLSCTX_INPROC_SERVER, COINIT_MULTITHREADED, EOAC_NONE, RPC_C_AUTHN_LEVEL_CALL,
    RPC_C_AUTHN_LEVEL_DEFAULT, RPC_C_IMP_LEVEL_IMPERSONATE,
};
use windows::Win32::System::Rpc::{RPC_C_AUTHN_WINNT, RPC_C_AUTHZ_NONE};
use windows::Win32::System::Wmi::{
    IEnumWbemClassObject, IWbemClassObject, IWbemLocator, IWbemServices, WbemLocator,
    WBEM_FLAG_FORWARD_ONLY, WBEM_FLAG_RETURN_IMMEDIATELY, WBEM_INFINITE,
};

use crate::provider::{VmInfo, VmProvider};
use crate::state::VmState;
use crate::{Error, Result};

const NAMESPACE: &str = r"ROOT\Virtualization\V2";
const VM_QUERY: &str = r#"SELECT * FROM Msvm_ComputerSystem WHERE Caption="Virtual Machine""#;

pub struct WmiProvider {
    services: IWbemServices,
}

impl WmiProvider {
    /// Initialize COM for this thread and connect to the virtualization
    /// namespace.
    pub fn connect() -> Result<Self> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED).ok()?;

            // Security may already be set if another component got there
            // first; that is fine.
            if let Err(e) = CoInitializeSecurity(
                None,
                -1,
                None,
                None,
                RPC_C_AUTHN_LEVEL_DEFAULT,
                RPC_C_IMP_LEVEL_IMPERSONATE,
                None,
                EOAC_NONE,
                None,
            ) {
                if e.code() != RPC_E_TOO_LATE {
                    return Err(e.into());
                }
            }

            let locator: IWbemLocator = CoCreateInstance(&WbemLocator, None, CLSCTX_INPROC_SERVER)?;
            let services = locator.ConnectServer(
                &BSTR::from(NAMESPACE),
                &BSTR::new(),
                &BSTR::new(),
                &BSTR::new(),
                0,
                &BSTR::new(),
                None,
            )?;

            CoSetProxyBlanket(
                &services,
                RPC_C_AUTHN_WINNT,
                RPC_C_AUTHZ_NONE,
                None,
                RPC_C_AUTHN_LEVEL_CALL,
                RPC_C_IMP_LEVEL_IMPERSONATE,
                None,
                EOAC_NONE,
            )?;

            tracing::debug!(namespace = NAMESPACE, "connected to WMI");
            Ok(Self { services })
        }
    }

    fn exec_query(&self, wql: &str) -> Result<IEnumWbemClassObject> {
        unsafe {
            let query = self.services.ExecQuery(
                &BSTR::from("WQL"),
                &BSTR::from(wql),
                WBEM_FLAG_RETURN_IMMEDIATELY | WBEM_FLAG_FORWARD_ONLY,
                None,
            )?;
            Ok(query)
        }
    }

    /// Resolve a VM by display name to its WMI object path.
    fn vm_path(&self, name: &str) -> Result<String> {
        let wql = format!(
            r#"SELECT * FROM Msvm_ComputerSystem WHERE Caption="Virtual Machine" AND ElementName="{}""#,
            escape_wql(name)
        );
        let query = self.exec_query(&wql)?;
        let object = next_object(&query)?.ok_or_else(|| Error::VmNotFound(name.to_string()))?;
        string_prop(&object, "__PATH")
    }

    fn find_vm(&self, name: &str) -> Result<IWbemClassObject> {
        let wql = format!(
            r#"SELECT * FROM Msvm_ComputerSystem WHERE Caption="Virtual Machine" AND ElementName="{}""#,
            escape_wql(name)
        );
        let query = self.exec_query(&wql)?;
        next_object(&query)?.ok_or_else(|| Error::VmNotFound(name.to_string()))
    }

    /// Spawn the in-parameters instance for `method` of `class_name`.
    fn method_params(&self, class_name: &str, method: &str) -> Result<IWbemClassObject> {
        unsafe {
            let mut class: Option<IWbemClassObject> = None;
            self.services.GetObject(
                &BSTR::from(class_name),
                Default::default(),
                None,
                Some(&mut class),
                None,
            )?;
            let class =
                class.ok_or_else(|| Error::Wmi(format!("class not found: {class_name}")))?;

            let method_name = HSTRING::from(method);
            let mut in_signature: Option<IWbemClassObject> = None;
            let mut out_signature: Option<IWbemClassObject> = None;
            class.GetMethod(
                PCWSTR(method_name.as_ptr()),
                0,
                &mut in_signature,
                &mut out_signature,
            )?;
            let in_signature = in_signature
                .ok_or_else(|| Error::Wmi(format!("method has no parameters: {method}")))?;

            Ok(in_signature.SpawnInstance(0)?)
        }
    }

    fn exec_method(&self, path: &str, method: &str, params: &IWbemClassObject) -> Result<()> {
        unsafe {
            let mut out: Option<IWbemClassObject> = None;
            self.services.ExecMethod(
                &BSTR::from(path),
                &BSTR::from(method),
                Default::default(),
                None,
                params,
                Some(&mut out),
                None,
            )?;
            Ok(())
        }
    }
}

impl VmProvider for WmiProvider {
    fn enumerate(&self) -> Result<Vec<VmInfo>> {
        let query = self.exec_query(VM_QUERY)?;
        let mut vms = Vec::new();

        while let Some(object) = next_object(&query)? {
            let Ok(name) = string_prop(&object, "ElementName") else {
                continue;
            };
            let Ok(code) = integer_prop(&object, "EnabledState") else {
                continue;
            };
            vms.push(VmInfo::new(name, VmState::from_code(code)));
        }

        Ok(vms)
    }

    fn state_of(&self, name: &str) -> Result<VmState> {
        let object = self.find_vm(name)?;
        let code = integer_prop(&object, "EnabledState")?;
        Ok(VmState::from_code(code))
    }

    fn request_state_change(&self, name: &str, target: VmState) -> Result<()> {
        let path = self.vm_path(name)?;
        let params = self.method_params("Msvm_ComputerSystem", "RequestStateChange")?;
        unsafe {
            params.Put(
                windows::core::w!("RequestedState"),
                0,
                &VARIANT::from(target.code() as i32),
                0,
            )?;
        }
        self.exec_method(&path, "RequestStateChange", &params)
    }

    fn shutdown(&self, name: &str) -> Result<()> {
        // Orderly shutdown is a capability of the associated shutdown
        // component, not a state transition on the VM object itself.
        let path = self.vm_path(name)?;
        let wql = format!("ASSOCIATORS OF {{{path}}} WHERE ResultClass=Msvm_ShutdownComponent");
        let query = self.exec_query(&wql)?;
        let component = next_object(&query)?
            .ok_or_else(|| Error::Wmi(format!("no shutdown component for {name}")))?;
        let component_path = string_prop(&component, "__PATH")?;

        let params = self.method_params("Msvm_ShutdownComponent", "InitiateShutdown")?;
        unsafe {
            params.Put(windows::core::w!("Force"), 0, &VARIANT::from(true), 0)?;
            params.Put(
                windows::core::w!("Reason"),
                0,
                &VARIANT::from(BSTR::from("Requested from the notification area")),
                0,
            )?;
        }
        self.exec_method(&component_path, "InitiateShutdown", &params)
    }
}

/// Pull the next object off an enumerator, mapping "no more rows" to `None`.
fn next_object(query: &IEnumWbemClassObject) -> Result<Option<IWbemClassObject>> {
    unsafe {
        let mut row: [Option<IWbemClassObject>; 1] = [None];
        let mut returned = 0;
        query.Next(WBEM_INFINITE, &mut row, &mut returned).ok()?;
        if returned == 0 {
            return Ok(None);
        }
        Ok(row[0].take())
    }
}

fn string_prop(object: &IWbemClassObject, name: &str) -> Result<String> {
    unsafe {
        let prop = HSTRING::from(name);
        let mut value = VARIANT::default();
        object.Get(PCWSTR(prop.as_ptr()), 0, &mut value, None, None)?;
        BSTR::try_from(&value)
            .map(|b| b.to_string())
            .map_err(|_| Error::Property(name.to_string()))
    }
}

fn integer_prop(object: &IWbemClassObject, name: &str) -> Result<u32> {
    unsafe {
        let prop = HSTRING::from(name);
        let mut value = VARIANT::default();
        object.Get(PCWSTR(prop.as_ptr()), 0, &mut value, None, None)?;
        i32::try_from(&value)
            .map(|v| v as u32)
            .map_err(|_| Error::Property(name.to_string()))
    }
}

/// Escape a string literal for inclusion in a WQL query.
fn escape_wql(s: &str) -> String {
    s.replace('\\', r"\\").replace('"', r#"\""#)
}
