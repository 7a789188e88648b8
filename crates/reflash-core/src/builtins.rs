//! Built-in flash script commands.
//!
//! Each handler maps one script command to a vendor tool invocation:
//! `FLASH(boot, boot.img)` becomes `fastboot flash boot <dir>/boot.img`,
//! `ADB_REBOOT(recovery)` becomes `adb reboot recovery`, and so on. Handlers
//! validate argument counts up front and report wrong arity distinctly from
//! tool failures.
//!
//! The same handlers are reachable two ways: [`register_builtins`] installs
//! them under their canonical names, and [`BuiltinModules`] exposes them to
//! dynamic declaration files under `flash` / `unlock` / `system` /
//! `mtk_spflashtool` module names.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::registry::{CommandRegistry, Handler, HandlerError, HandlerSource};
use crate::tool::{Tool, ToolContext};

/// Partition names and the image files that may back them, in probe order.
/// Used by `FLASH_ALL`; the first existing candidate per partition wins.
const PARTITION_IMAGES: &[(&str, &[&str])] = &[
    ("boot", &["boot.img", "boot_a.img"]),
    ("system", &["system.img", "system_a.img"]),
    ("vendor", &["vendor.img", "vendor_a.img"]),
    ("recovery", &["recovery.img", "recovery_a.img"]),
    ("dtbo", &["dtbo.img", "dtbo_a.img"]),
    ("vbmeta", &["vbmeta.img", "vbmeta_a.img"]),
];

fn arity(args: &[String], min: usize, max: usize, expected: &'static str) -> Result<(), HandlerError> {
    if args.len() < min || args.len() > max {
        return Err(HandlerError::Arity {
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn run(ctx: &dyn ToolContext, tool: Tool, args: &[&str]) -> Result<bool, HandlerError> {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    Ok(ctx.run_tool(tool, &args)?.success)
}

/// `FLASH(partition, file)` — flash an image, resolved against the script dir.
pub fn flash(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 2, 2, "2")?;
    let path = ctx.script_dir().join(&args[1]);
    if !path.exists() {
        warn!(path = %path.display(), "image file not found");
        return Ok(false);
    }
    run(ctx, Tool::Fastboot, &["flash", &args[0], &path.to_string_lossy()])
}

/// `FLASH_ALL([dir])` — flash every known partition image found in a directory.
pub fn flash_all(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 0, 1, "0 to 1")?;
    let dir = args.first().map(String::as_str).unwrap_or(".");
    let base = ctx.script_dir().join(dir);
    let mut success = true;

    for &(partition, candidates) in PARTITION_IMAGES {
        for &file in candidates {
            let path = base.join(file);
            if path.exists() {
                info!(partition, image = file, "found partition image");
                if !run(ctx, Tool::Fastboot, &["flash", partition, &path.to_string_lossy()])? {
                    success = false;
                }
                break;
            }
        }
    }

    Ok(success)
}

/// `UNLOCK([method])` — `OLD` uses the legacy oem path.
pub fn unlock(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 0, 1, "0 to 1")?;
    if args.first().is_some_and(|m| m.eq_ignore_ascii_case("OLD")) {
        run(ctx, Tool::Fastboot, &["oem", "unlock"])
    } else {
        run(ctx, Tool::Fastboot, &["flashing", "unlock"])
    }
}

/// `LOCK([method])` — `OLD` uses the legacy oem path.
pub fn lock(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 0, 1, "0 to 1")?;
    if args.first().is_some_and(|m| m.eq_ignore_ascii_case("OLD")) {
        run(ctx, Tool::Fastboot, &["oem", "lock"])
    } else {
        run(ctx, Tool::Fastboot, &["flashing", "lock"])
    }
}

/// `UNLOCK_CRITICAL()` — unlock critical partitions.
pub fn unlock_critical(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 0, 0, "0")?;
    run(ctx, Tool::Fastboot, &["flashing", "unlock_critical"])
}

/// `GET_UNLOCK_DATA()` — fetch OEM unlock data.
pub fn get_unlock_data(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 0, 0, "0")?;
    run(ctx, Tool::Fastboot, &["oem", "get_unlock_data"])
}

/// `UNLOCK_INFO()` — print bootloader lock state.
pub fn unlock_info(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 0, 0, "0")?;
    run(ctx, Tool::Fastboot, &["oem", "device-info"])
}

/// `ERASE(partition)`.
pub fn erase(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 1, 1, "1")?;
    run(ctx, Tool::Fastboot, &["erase", &args[0]])
}

fn reboot_args(target: Option<&String>) -> Vec<&str> {
    match target {
        Some(t) if t.eq_ignore_ascii_case("BOOTLOADER") => vec!["reboot", "bootloader"],
        Some(t) if t.eq_ignore_ascii_case("RECOVERY") => vec!["reboot", "recovery"],
        _ => vec!["reboot"],
    }
}

/// `REBOOT([target])` — via fastboot; target `BOOTLOADER` or `RECOVERY`.
pub fn reboot(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 0, 1, "0 to 1")?;
    run(ctx, Tool::Fastboot, &reboot_args(args.first()))
}

/// `ADB_REBOOT([target])` — via adb; target `BOOTLOADER` or `RECOVERY`.
pub fn adb_reboot(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 0, 1, "0 to 1")?;
    run(ctx, Tool::Adb, &reboot_args(args.first()))
}

/// `FORMAT(partition[, fs])` — fs defaults to ext4.
pub fn format(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 1, 2, "1 to 2")?;
    let fs = args.get(1).map(String::as_str).unwrap_or("ext4");
    run(ctx, Tool::Fastboot, &["format", &format!("--fs={fs}"), &args[0]])
}

/// `OEM(command)`.
pub fn oem(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 1, 1, "1")?;
    run(ctx, Tool::Fastboot, &["oem", &args[0]])
}

/// `WAIT(seconds)` — sleep; a malformed or negative duration is a fault.
pub fn wait(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 1, 1, "1")?;
    let duration = args[0]
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| HandlerError::Fault(format!("invalid wait duration '{}'", args[0])))?;
    info!(seconds = duration.as_secs_f64(), "waiting");
    ctx.sleep(duration);
    Ok(true)
}

/// `GETVAR(variable)` — query a device variable.
pub fn getvar(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 1, 1, "1")?;
    run(ctx, Tool::Fastboot, &["getvar", &args[0]])
}

/// `DEVICES()` — list fastboot devices.
pub fn devices(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 0, 0, "0")?;
    run(ctx, Tool::Fastboot, &["devices"])
}

/// `ADB_DEVICES()` — list adb devices.
pub fn adb_devices(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 0, 0, "0")?;
    run(ctx, Tool::Adb, &["devices"])
}

/// `FLASH_MTK(da_file, scatter_file, mode)` — SP Flash Tool invocation.
pub fn flash_mtk(ctx: &dyn ToolContext, args: &[String]) -> Result<bool, HandlerError> {
    arity(args, 3, 3, "3")?;
    run(
        ctx,
        Tool::SpFlashTool,
        &["-d", &args[0], "-s", &args[1], "-c", &args[2]],
    )
}

/// Installs every built-in command under its canonical name.
pub fn register_builtins(registry: &mut CommandRegistry) {
    registry.register("FLASH", Arc::new(flash));
    registry.register("FLASH_ALL", Arc::new(flash_all));
    registry.register("UNLOCK", Arc::new(unlock));
    registry.register("LOCK", Arc::new(lock));
    registry.register("UNLOCK_CRITICAL", Arc::new(unlock_critical));
    registry.register("GET_UNLOCK_DATA", Arc::new(get_unlock_data));
    registry.register("UNLOCK_INFO", Arc::new(unlock_info));
    registry.register("ERASE", Arc::new(erase));
    registry.register("REBOOT", Arc::new(reboot));
    registry.register("ADB_REBOOT", Arc::new(adb_reboot));
    registry.register("FORMAT", Arc::new(format));
    registry.register("OEM", Arc::new(oem));
    registry.register("WAIT", Arc::new(wait));
    registry.register("GETVAR", Arc::new(getvar));
    registry.register("DEVICES", Arc::new(devices));
    registry.register("ADB_DEVICES", Arc::new(adb_devices));
    registry.register("FLASH_MTK", Arc::new(flash_mtk));
}

/// [`HandlerSource`] exposing the built-in handlers to declaration files.
///
/// Module and function names follow the historical layout, e.g.
/// `flash:flash_partition`, `unlock:unlock_device:FORCE_UNLOCK`,
/// `system:wait_command`, `mtk_spflashtool:flashmtk_device`.
pub struct BuiltinModules;

impl HandlerSource for BuiltinModules {
    fn resolve(&self, module: &str, function: &str) -> Option<Handler> {
        let handler: Handler = match (module, function) {
            ("flash", "flash_partition") => Arc::new(flash),
            ("flash", "flash_all") => Arc::new(flash_all),
            ("unlock", "unlock_device") => Arc::new(unlock),
            ("unlock", "lock_device") => Arc::new(lock),
            ("unlock", "unlock_critical") => Arc::new(unlock_critical),
            ("unlock", "get_unlock_data") => Arc::new(get_unlock_data),
            ("unlock", "unlock_info") => Arc::new(unlock_info),
            ("system", "reboot_device") => Arc::new(adb_reboot),
            ("system", "fb_reboot_device") => Arc::new(reboot),
            ("system", "erase_partition") => Arc::new(erase),
            ("system", "format_partition") => Arc::new(format),
            ("system", "oem_command") => Arc::new(oem),
            ("system", "wait_command") => Arc::new(wait),
            ("system", "getvar") => Arc::new(getvar),
            ("system", "devices") => Arc::new(devices),
            ("system", "adb_devices") => Arc::new(adb_devices),
            ("mtk_spflashtool", "flashmtk_device") => Arc::new(flash_mtk),
            _ => return None,
        };
        Some(handler)
    }
}
