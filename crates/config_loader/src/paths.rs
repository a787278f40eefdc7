//! 相对路径解析
//!
//! 从文件加载的配置中，信号文件、参考文件与输出目录的相对路径
//! 以配置文件所在目录为基准。流路径可带 `raw:` / `ascii:` 驱动前缀。

use std::path::Path;

use contracts::SyncBlueprint;

const DRIVER_PREFIXES: [&str; 2] = ["raw:", "ascii:"];

/// 将蓝图中的相对路径改写为基于 `base` 的路径
pub fn resolve_relative(blueprint: &mut SyncBlueprint, base: &Path) {
    let run = &mut blueprint.run;
    run.signal_file = resolve_stream(&run.signal_file, base);
    if let Some(reference) = run.reference_file.as_mut() {
        *reference = resolve_stream(reference, base);
    }
    if run.output_dir.is_relative() {
        run.output_dir = base.join(&run.output_dir);
    }
}

fn resolve_stream(location: &str, base: &Path) -> String {
    let (prefix, path) = DRIVER_PREFIXES
        .iter()
        .find_map(|p| location.strip_prefix(p).map(|rest| (*p, rest)))
        .unwrap_or(("", location));
    if path.is_empty() || Path::new(path).is_absolute() {
        return location.to_string();
    }
    format!("{}{}", prefix, base.join(path).display())
}
