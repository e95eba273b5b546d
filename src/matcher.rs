use crate::domain::DomainKey;
use crate::r#const::router::wildcards;
use std::collections::HashSet;

/// 在规则集中查找与主机名匹配的规则
///
/// 先精确匹配，然后逐级去掉最左侧标签再检查，直到命中或不再含有 `.`。
/// 只在标签边界上切片，不分配内存，耗时与标签数成正比。
pub fn find_match<'a>(hostname: &str, rules: &'a HashSet<DomainKey>) -> Option<&'a DomainKey> {
    if rules.is_empty() || hostname.is_empty() {
        return None;
    }

    let mut current = hostname;
    loop {
        if let Some(key) = rules.get(current) {
            return Some(key);
        }

        // 去掉最左边的标签进行下一次匹配
        match current.find(wildcards::DOT) {
            Some(dot_pos) => current = &current[dot_pos + 1..],
            None => return None,
        }
    }
}

/// 判断主机名是否命中规则集（精确匹配或任一父域匹配）
#[inline]
pub fn matches(hostname: &str, rules: &HashSet<DomainKey>) -> bool {
    find_match(hostname, rules).is_some()
}
