use crate::{ModelError, ModelResult};
use burn::module::{Module, Param};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput};
use burn::nn::{Initializer, LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VitVariant {
    Nano,
    Tiny,
    Small,
    Base,
    Large,
}

impl VitVariant {
    pub const ALL: [VitVariant; 5] = [
        VitVariant::Nano,
        VitVariant::Tiny,
        VitVariant::Small,
        VitVariant::Base,
        VitVariant::Large,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VitVariant::Nano => "nano",
            VitVariant::Tiny => "tiny",
            VitVariant::Small => "small",
            VitVariant::Base => "base",
            VitVariant::Large => "large",
        }
    }

    /// (patch, d_model, depth, heads, mlp width)
    fn dims(self) -> (usize, usize, usize, usize, usize) {
        match self {
            VitVariant::Nano => (8, 64, 2, 2, 128),
            VitVariant::Tiny => (16, 192, 12, 3, 768),
            VitVariant::Small => (16, 384, 12, 6, 1536),
            VitVariant::Base => (16, 768, 12, 12, 3072),
            VitVariant::Large => (16, 1024, 24, 16, 4096),
        }
    }
}

impl fmt::Display for VitVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VitVariant {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        // accept both `base` and prefixed names like `vit-base`
        let name = lower.strip_prefix("vit-").unwrap_or(&lower);
        VitVariant::ALL
            .into_iter()
            .find(|v| v.as_str() == name)
            .ok_or_else(|| ModelError::UnknownVariant(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VitConfig {
    pub variant: VitVariant,
    pub image_size: usize,
    pub channels: usize,
    pub patch_size: usize,
    pub d_model: usize,
    pub depth: usize,
    pub n_heads: usize,
    pub d_ff: usize,
    pub dropout: f64,
    pub n_classes: usize,
}

impl VitConfig {
    pub fn preset(
        variant: VitVariant,
        image_size: usize,
        channels: usize,
        n_classes: usize,
    ) -> ModelResult<Self> {
        let (patch_size, d_model, depth, n_heads, d_ff) = variant.dims();
        let cfg = Self {
            variant,
            image_size,
            channels,
            patch_size,
            d_model,
            depth,
            n_heads,
            d_ff,
            dropout: 0.0,
            n_classes,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.image_size == 0 || self.image_size % self.patch_size != 0 {
            return Err(ModelError::PatchMismatch {
                dim: self.image_size,
                patch: self.patch_size,
            });
        }
        if self.channels != 1 && self.channels != 3 {
            return Err(ModelError::Channels(self.channels));
        }
        if self.n_classes < 2 {
            return Err(ModelError::Classes(self.n_classes));
        }
        Ok(())
    }

    pub fn n_patches(&self) -> usize {
        let side = self.image_size / self.patch_size;
        side * side
    }
}

#[derive(Debug, Module)]
pub struct VitBackbone<B: Backend> {
    patch_embed: Conv2d<B>,
    cls_token: Param<Tensor<B, 3>>,
    pos_embed: Param<Tensor<B, 3>>,
    encoder: TransformerEncoder<B>,
    norm: LayerNorm<B>,
    d_model: usize,
}

impl<B: Backend> VitBackbone<B> {
    pub fn new(cfg: &VitConfig, device: &B::Device) -> Self {
        let patch = cfg.patch_size;
        let patch_embed = Conv2dConfig::new([cfg.channels, cfg.d_model], [patch, patch])
            .with_stride([patch, patch])
            .init(device);
        let init = Initializer::Normal {
            mean: 0.0,
            std: 0.02,
        };
        let cls_token = init.init([1, 1, cfg.d_model], device);
        let pos_embed = init.init([1, cfg.n_patches() + 1, cfg.d_model], device);
        let encoder = TransformerEncoderConfig::new(cfg.d_model, cfg.d_ff, cfg.n_heads, cfg.depth)
            .with_norm_first(true)
            .with_dropout(cfg.dropout)
            .init(device);
        let norm = LayerNormConfig::new(cfg.d_model).init(device);
        Self {
            patch_embed,
            cls_token,
            pos_embed,
            encoder,
            norm,
            d_model: cfg.d_model,
        }
    }

    /// Images `[N, C, H, W]` → class-token features `[N, d_model]`.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let n = images.dims()[0];
        let patches = self.patch_embed.forward(images);
        let tokens = patches.flatten::<3>(2, 3).swap_dims(1, 2);
        let cls = self.cls_token.val().repeat_dim(0, n);
        let x = Tensor::cat(vec![cls, tokens], 1) + self.pos_embed.val();
        let x = self.encoder.forward(TransformerEncoderInput::new(x));
        let x = self.norm.forward(x);
        x.slice([0..n, 0..1, 0..self.d_model]).reshape([n, self.d_model])
    }
}

#[derive(Debug, Module)]
pub struct VitClassifier<B: Backend> {
    backbone: VitBackbone<B>,
    head: Linear<B>,
}

impl<B: Backend> VitClassifier<B> {
    pub fn new(cfg: &VitConfig, device: &B::Device) -> ModelResult<Self> {
        cfg.validate()?;
        Ok(Self {
            backbone: VitBackbone::new(cfg, device),
            head: LinearConfig::new(cfg.d_model, cfg.n_classes).init(device),
        })
    }

    /// Logits `[N, n_classes]`.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head.forward(self.backbone.forward(images))
    }

    pub fn backbone(&self) -> &VitBackbone<B> {
        &self.backbone
    }

    pub(crate) fn with_backbone(self, backbone: VitBackbone<B>) -> Self {
        Self {
            backbone,
            head: self.head,
        }
    }
}
