//! Host hardware report
//!
//! Reports the CPU architecture, the SIMD extensions detected at runtime and
//! the core counts used to size the runtime's compute thread pool.

use serde::Serialize;

/// Snapshot of the host's compute capabilities
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    pub architecture: &'static str,
    pub cpu_features: Vec<&'static str>,
    pub logical_cores: usize,
    pub physical_cores: usize,
    /// Threads a new session uses unless configured otherwise
    pub default_threads: u32,
}

/// Collect the host report
pub fn detect() -> SystemInfo {
    SystemInfo {
        architecture: std::env::consts::ARCH,
        cpu_features: cpu_features(),
        logical_cores: num_cpus::get(),
        physical_cores: num_cpus::get_physical(),
        default_threads: default_thread_count(),
    }
}

/// Half of the available cores, at least one
pub fn default_thread_count() -> u32 {
    (num_cpus::get() / 2).max(1) as u32
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn cpu_features() -> Vec<&'static str> {
    let mut features = Vec::new();
    macro_rules! probe {
        ($($feature:tt => $label:expr),* $(,)?) => {
            $(
                if std::arch::is_x86_feature_detected!($feature) {
                    features.push($label);
                }
            )*
        };
    }
    probe!(
        "sse2" => "SSE2",
        "sse3" => "SSE3",
        "ssse3" => "SSSE3",
        "sse4.1" => "SSE4.1",
        "sse4.2" => "SSE4.2",
        "avx" => "AVX",
        "avx2" => "AVX2",
        "fma" => "FMA",
        "f16c" => "F16C",
        "avx512f" => "AVX512F",
        "avx512bw" => "AVX512BW",
        "avx512dq" => "AVX512DQ",
        "avx512vl" => "AVX512VL",
    );
    features
}

#[cfg(target_arch = "aarch64")]
fn cpu_features() -> Vec<&'static str> {
    let mut features = Vec::new();
    if std::arch::is_aarch64_feature_detected!("neon") {
        features.push("NEON");
    }
    if std::arch::is_aarch64_feature_detected!("sve") {
        features.push("SVE");
    }
    features
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
fn cpu_features() -> Vec<&'static str> {
    Vec::new()
}
