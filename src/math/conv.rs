//! Stride-1, same-padded 2-D convolution and 2×2 max pooling on NCHW tensors.
//!
//! These are plain functions over borrowed tensors so that both trainable
//! layers and the frozen feature extractor can share them.

use crate::error::{Error, Result};
use crate::math::tensor::Tensor;

/// Gradients produced by [`conv2d_backward`].
pub struct ConvGrads {
    pub input: Tensor,
    pub weights: Tensor,
    pub bias: Vec<f64>,
}

fn check_conv_shapes(input: &Tensor, weights: &Tensor, bias: &[f64]) -> Result<()> {
    let [_, c, _, _] = input.shape();
    let [o, wc, kh, kw] = weights.shape();
    if wc != c {
        return Err(Error::DataShape(format!(
            "convolution expects {} input channels, got {}",
            wc, c
        )));
    }
    if kh != kw || kh % 2 == 0 {
        return Err(Error::Model(format!("kernel must be square and odd, got {}x{}", kh, kw)));
    }
    if bias.len() != o {
        return Err(Error::Model(format!("{} biases for {} output channels", bias.len(), o)));
    }
    Ok(())
}

/// out[n,o,y,x] = b[o] + Σ_{c,i,j} w[o,c,i,j] · in[n,c,y+i−p,x+j−p], zero padding p = k/2.
pub fn conv2d_forward(input: &Tensor, weights: &Tensor, bias: &[f64]) -> Result<Tensor> {
    check_conv_shapes(input, weights, bias)?;
    let [n, c, h, w] = input.shape();
    let [o, _, k, _] = weights.shape();
    let pad = k / 2;
    let mut out = Tensor::zeros([n, o, h, w]);
    let src = input.data();
    let ker = weights.data();
    let dst = out.data_mut();

    for b in 0..n {
        for oc in 0..o {
            let out_base = (b * o + oc) * h * w;
            dst[out_base..out_base + h * w].iter_mut().for_each(|v| *v = bias[oc]);
            for ic in 0..c {
                let in_base = (b * c + ic) * h * w;
                let k_base = (oc * c + ic) * k * k;
                for i in 0..k {
                    for j in 0..k {
                        let wv = ker[k_base + i * k + j];
                        if wv == 0.0 {
                            continue;
                        }
                        for y in 0..h {
                            let sy = y + i;
                            if sy < pad || sy - pad >= h {
                                continue;
                            }
                            let row_in = in_base + (sy - pad) * w;
                            let row_out = out_base + y * w;
                            for x in 0..w {
                                let sx = x + j;
                                if sx < pad || sx - pad >= w {
                                    continue;
                                }
                                dst[row_out + x] += wv * src[row_in + sx - pad];
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Back-propagates `grad_out` (∂L/∂out) through [`conv2d_forward`].
pub fn conv2d_backward(input: &Tensor, weights: &Tensor, grad_out: &Tensor) -> Result<ConvGrads> {
    let [n, c, h, w] = input.shape();
    let [o, _, k, _] = weights.shape();
    if grad_out.shape() != [n, o, h, w] {
        return Err(Error::DataShape(format!(
            "gradient shape {:?} does not match convolution output [{}, {}, {}, {}]",
            grad_out.shape(), n, o, h, w
        )));
    }
    let pad = k / 2;
    let mut grad_input = Tensor::zeros(input.shape());
    let mut grad_weights = Tensor::zeros(weights.shape());
    let mut grad_bias = vec![0.0; o];

    let src = input.data();
    let ker = weights.data();
    let g = grad_out.data();
    let gi = grad_input.data_mut();
    let gw = grad_weights.data_mut();

    for b in 0..n {
        for oc in 0..o {
            let out_base = (b * o + oc) * h * w;
            grad_bias[oc] += g[out_base..out_base + h * w].iter().sum::<f64>();
            for ic in 0..c {
                let in_base = (b * c + ic) * h * w;
                let k_base = (oc * c + ic) * k * k;
                for i in 0..k {
                    for j in 0..k {
                        let wv = ker[k_base + i * k + j];
                        let mut acc = 0.0;
                        for y in 0..h {
                            let sy = y + i;
                            if sy < pad || sy - pad >= h {
                                continue;
                            }
                            let row_in = in_base + (sy - pad) * w;
                            let row_out = out_base + y * w;
                            for x in 0..w {
                                let sx = x + j;
                                if sx < pad || sx - pad >= w {
                                    continue;
                                }
                                let go = g[row_out + x];
                                acc += go * src[row_in + sx - pad];
                                gi[row_in + sx - pad] += go * wv;
                            }
                        }
                        gw[k_base + i * k + j] += acc;
                    }
                }
            }
        }
    }

    Ok(ConvGrads { input: grad_input, weights: grad_weights, bias: grad_bias })
}

/// 2×2 max pooling with stride 2. Odd trailing rows/columns are dropped.
/// Returns the pooled tensor and, per output element, the flat input offset
/// that won the max (needed for the backward pass).
pub fn max_pool2_forward(input: &Tensor) -> (Tensor, Vec<usize>) {
    let [n, c, h, w] = input.shape();
    let (oh, ow) = (h / 2, w / 2);
    let mut out = Tensor::zeros([n, c, oh, ow]);
    let mut winners = vec![0usize; n * c * oh * ow];
    for b in 0..n {
        for ch in 0..c {
            for y in 0..oh {
                for x in 0..ow {
                    let mut best = input.offset(b, ch, 2 * y, 2 * x);
                    for (dy, dx) in [(0, 1), (1, 0), (1, 1)] {
                        let idx = input.offset(b, ch, 2 * y + dy, 2 * x + dx);
                        if input.data()[idx] > input.data()[best] {
                            best = idx;
                        }
                    }
                    let o = out.offset(b, ch, y, x);
                    out.data_mut()[o] = input.data()[best];
                    winners[o] = best;
                }
            }
        }
    }
    (out, winners)
}

/// Routes each pooled gradient back to the input element that won the max.
pub fn max_pool2_backward(input_shape: [usize; 4], winners: &[usize], grad_out: &Tensor) -> Tensor {
    let mut grad_input = Tensor::zeros(input_shape);
    let gi = grad_input.data_mut();
    for (&src, &g) in winners.iter().zip(grad_out.data().iter()) {
        gi[src] += g;
    }
    grad_input
}
