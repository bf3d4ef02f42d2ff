//! Device selector resolution.

/// Backend index meaning "run on the CPU".
pub const CPU_DEVICE: i32 = -1;

/// Map a user-facing device selector to a backend device index.
///
/// `"cpu"` is -1, anything starting with `"cuda"` and `"gpu"` are device 0,
/// and any other string is parsed as an index, falling back to the CPU when
/// it is not a number. Matching ignores case and surrounding whitespace.
pub fn resolve_device(device: &str) -> i32 {
    let dev = device.trim().to_lowercase();
    if dev == "cpu" {
        CPU_DEVICE
    } else if dev.starts_with("cuda") || dev == "gpu" {
        0
    } else {
        dev.parse::<i32>().unwrap_or(CPU_DEVICE)
    }
}
