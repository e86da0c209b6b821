//! 可注入、可重新播种的伪随机源
//!
//! 抖动（jitter）等随机行为都通过构造时传入的 [`RandomSource`] 获得，
//! 不使用进程级全局状态，保证测试可复现。

/// 伪随机源接口
pub trait RandomSource: Send + std::fmt::Debug {
    /// 以新种子重置内部状态
    fn reseed(&mut self, seed: u64);
    /// 下一个 64-bit 随机数
    fn next_u64(&mut self) -> u64;

    /// `[0, bound)` 内的随机数；`bound == 0` 时返回 0
    fn next_below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        self.next_u64() % bound
    }
}

/// 基于 splitmix64 的确定性随机源
#[derive(Debug, Clone)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }
}

impl RandomSource for SplitMix64 {
    fn reseed(&mut self, seed: u64) {
        self.state = seed;
    }

    fn next_u64(&mut self) -> u64 {
        let out = mix64(self.state);
        self.state = self.state.wrapping_add(1);
        out
    }
}

/// 一个简单、确定性的 64-bit mixing（替代 RandomState，避免每次运行结果不稳定）。
pub fn mix64(mut x: u64) -> u64 {
    // splitmix64
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
