//! 安全随机数生成模块
//!
//! 提供验证码生成所需的密码学安全随机数，以及常量时间比较。

use rand::{TryRngCore, rngs::OsRng};

use crate::error::{CryptoError, Error, Result};

/// 生成指定长度的数字验证码
///
/// 每一位独立、均匀地取自 0-9，使用操作系统提供的 CSPRNG。
/// 通过拒绝采样消除取模偏差。
///
/// # Example
///
/// ```rust
/// use otpgate::random::generate_numeric_code;
///
/// let code = generate_numeric_code(6).unwrap();
/// assert_eq!(code.len(), 6);
/// assert!(code.chars().all(|c| c.is_ascii_digit()));
/// ```
pub fn generate_numeric_code(length: usize) -> Result<String> {
    let mut code = String::with_capacity(length);
    let mut buf = [0u8; 16];

    while code.len() < length {
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| Error::Crypto(CryptoError::RngFailed(format!("{:?}", e))))?;

        for byte in buf {
            // 250 = 25 * 10，大于等于 250 的字节会引入偏差
            if byte >= 250 {
                continue;
            }
            code.push(char::from(b'0' + byte % 10));
            if code.len() == length {
                break;
            }
        }
    }

    Ok(code)
}

/// 常量时间比较两个字节切片
///
/// 用于防止时序攻击
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

/// 常量时间比较两个字符串
pub fn constant_time_compare_str(a: &str, b: &str) -> bool {
    constant_time_compare(a.as_bytes(), b.as_bytes())
}

// ============================================================================
// 验证码生成器
// ============================================================================

/// 验证码生成器
///
/// 默认实现为 [`OsCodeGenerator`]；测试中可注入固定输出的实现。
pub trait CodeGenerator: Send + Sync {
    /// 生成 `length` 位数字验证码
    fn generate(&self, length: usize) -> Result<String>;
}

/// 基于操作系统 CSPRNG 的验证码生成器
#[derive(Debug, Clone, Copy, Default)]
pub struct OsCodeGenerator;

impl CodeGenerator for OsCodeGenerator {
    fn generate(&self, length: usize) -> Result<String> {
        generate_numeric_code(length)
    }
}
