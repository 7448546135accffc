/// Legendre polynomial `P_n` evaluated at a single point by the three-term recurrence.
///
/// Besides the value itself, the recurrence keeps `P_{n-1}(x)`, which is all that is needed
/// to recover the first and second derivatives.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegendreRecurrence {
    n: usize,
    x: f64,
    // p_n(x)
    p1: f64,
    // p_{n - 1}(x)
    p2: f64,
}

impl LegendreRecurrence {
    pub fn evaluate(n: usize, x: f64) -> Self {
        //  m P_m(x) = (2m - 1) * x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
        let mut p1 = 1.0;
        let mut p2 = 0.0;
        let mut p3;
        for m in 1..=n {
            let m = m as f64;
            p3 = p2;
            p2 = p1;
            p1 = ((2.0 * m - 1.0) * x * p2 - (m - 1.0) * p3) / m;
        }

        Self { n, x, p1, p2 }
    }

    pub fn degree(&self) -> usize {
        self.n
    }

    pub fn value(&self) -> f64 {
        self.p1
    }

    /// The value of `P_{n-1}(x)`, or zero if `n == 0`.
    pub fn previous_value(&self) -> f64 {
        self.p2
    }

    pub fn derivative(&self) -> f64 {
        let Self { n, x, p1, p2 } = *self;
        let nf = n as f64;
        if x.abs() == 1.0 {
            // P'_n(1) = n (n + 1) / 2, and P'_n(-x) = (-1)^(n-1) P'_n(x)
            let magnitude = 0.5 * nf * (nf + 1.0);
            if x > 0.0 || n % 2 == 1 {
                magnitude
            } else {
                -magnitude
            }
        } else {
            // dp_n/dx (x) = n * (x * p_n(x) - p_{n - 1}(x)) / (x^2 - 1)
            nf * (x * p1 - p2) / (x * x - 1.0)
        }
    }

    /// Second derivative, only defined in the open interval `(-1, 1)`.
    pub fn second_derivative(&self) -> f64 {
        let n = self.n as f64;
        let x = self.x;
        // From Legendre's equation (1 - x^2) P'' - 2 x P' + n (n + 1) P = 0
        (2.0 * x * self.derivative() - n * (n + 1.0) * self.p1) / (1.0 - x * x)
    }

    pub fn value_and_derivative(&self) -> (f64, f64) {
        (self.value(), self.derivative())
    }
}
