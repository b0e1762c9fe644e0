//! 도메인 타입 -- 런타임이 보고하는 컨테이너 참조

use std::fmt;

use serde::{Deserialize, Serialize};

/// 런타임이 관리하는 컨테이너 인스턴스 참조
///
/// 런타임이 생성하고 트래커는 읽기만 합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerRef {
    /// 컨테이너 ID (런타임이 부여한 불투명 식별자)
    pub id: String,
    /// 사람이 읽을 수 있는 이름 (선행 `/` 제거됨, 없으면 빈 문자열)
    pub name: String,
}

impl ContainerRef {
    /// 새 컨테이너 참조를 생성합니다.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// 로그 출력용 12자리 축약 ID
    pub fn short_id(&self) -> &str {
        self.id.get(..12).unwrap_or(&self.id)
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.short_id())
        } else {
            write!(f, "{} ({})", self.name, self.short_id())
        }
    }
}
