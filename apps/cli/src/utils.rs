//! 参数解析工具

use armsync_protocol::Position;

/// 解析 `x,y,z`（也接受空白分隔）
pub fn parse_position(s: &str) -> Result<Position, String> {
    let parts: Vec<&str> = s.split([',', ' ']).filter(|p| !p.is_empty()).collect();
    if parts.len() != 3 {
        return Err(format!("expected x,y,z but got {:?}", s));
    }
    let mut values = [0.0f64; 3];
    for (value, part) in values.iter_mut().zip(&parts) {
        *value = part
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid coordinate {:?}: {}", part, e))?;
        if !value.is_finite() {
            return Err(format!("coordinate {:?} is not finite", part));
        }
    }
    Ok(Position::new(values[0], values[1], values[2]))
}

/// 解析夹爪宽度：`open` / `close` 或米数
pub fn parse_gripper(s: &str) -> Result<f64, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "open" => Ok(armsync_protocol::GRIPPER_OPEN),
        "close" | "closed" => Ok(armsync_protocol::GRIPPER_CLOSED),
        other => other
            .parse::<f64>()
            .ok()
            .filter(|w| w.is_finite() && *w >= 0.0)
            .ok_or_else(|| format!("invalid gripper width {:?}", s)),
    }
}
