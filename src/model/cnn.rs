//! CNN Model Architecture for Leaf Disease Classification
//!
//! Fixed topology; only the number of output classes varies:
//!
//! ```text
//! [B, 3, H, W]
//!   → Conv 3→16 (3x3, valid) → ReLU → MaxPool 2/2
//!   → Conv 16→32 (3x3, valid) → ReLU → MaxPool 2/2
//!   → Conv 32→64 (3x3, valid) → ReLU → MaxPool 2/2
//!   → AdaptiveAvgPool 7x7 → flatten (3136)
//!   → Linear 256 → ReLU → Dropout → Linear num_classes
//! ```

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{activation::softmax, backend::Backend, Tensor},
};

use crate::utils::error::PlantDocError;

/// Identifier of this topology, stored alongside trained parameters
pub const ARCHITECTURE: &str = "plantdoc-cnn-v1";

/// Smallest square input side the three conv/pool stages accept
pub const MIN_INPUT_SIZE: usize = 22;

/// Side of the adaptive pooling grid
pub const POOL_GRID: usize = 7;

/// Flattened feature width entering the head (64 * 7 * 7)
pub const FEATURE_DIM: usize = 64 * POOL_GRID * POOL_GRID;

/// Width of the hidden fully connected layer
pub const HIDDEN_DIM: usize = 256;

const CONV_CHANNELS: [(usize, usize); 3] = [(3, 16), (16, 32), (32, 64)];

/// Forward pass mode
///
/// Dropout is active only in `Training`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Training,
    Evaluating,
}

/// Configuration for the DiseaseClassifier
#[derive(Config, Debug)]
pub struct DiseaseClassifierConfig {
    /// Number of output classes (the label space size)
    pub num_classes: usize,

    /// Dropout rate in the classifier head
    #[config(default = "0.5")]
    pub dropout: f64,
}

impl DiseaseClassifierConfig {
    /// Initialize a classifier with fresh parameters
    pub fn init<B: Backend>(&self, device: &B::Device) -> DiseaseClassifier<B> {
        let [c1, c2, c3] = CONV_CHANNELS;

        DiseaseClassifier {
            conv1: ConvBlock::new(c1.0, c1.1, device),
            conv2: ConvBlock::new(c2.0, c2.1, device),
            conv3: ConvBlock::new(c3.0, c3.1, device),
            pool: AdaptiveAvgPool2dConfig::new([POOL_GRID, POOL_GRID]).init(),
            fc1: LinearConfig::new(FEATURE_DIM, HIDDEN_DIM).init(device),
            relu: Relu::new(),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc2: LinearConfig::new(HIDDEN_DIM, self.num_classes).init(device),
        }
    }
}

/// Conv2d (3x3, no padding) → ReLU → MaxPool 2x2 stride 2
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub relu: Relu,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);

        Self {
            conv,
            relu: Relu::new(),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Leaf disease classifier
#[derive(Module, Debug)]
pub struct DiseaseClassifier<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
    pub conv3: ConvBlock<B>,
    pub pool: AdaptiveAvgPool2d,
    pub fc1: Linear<B>,
    pub relu: Relu,
    pub dropout: Dropout,
    pub fc2: Linear<B>,
}

impl<B: Backend> DiseaseClassifier<B> {
    /// Forward pass
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width], both sides >= 22
    /// * `mode` - Training enables dropout
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>, mode: Mode) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);

        // [B, 64, h, w] -> [B, 64, 7, 7] -> [B, 3136]
        let x = self.pool.forward(x);
        let [batch_size, _, _, _] = x.dims();
        let x = x.reshape([batch_size, FEATURE_DIM]);

        let x = self.fc1.forward(x);
        let x = self.relu.forward(x);
        let x = match mode {
            Mode::Training => self.dropout.forward(x),
            Mode::Evaluating => x,
        };
        self.fc2.forward(x)
    }

    /// Evaluation-mode forward pass followed by softmax over classes
    pub fn forward_probabilities(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(x, Mode::Evaluating), 1)
    }

    /// Number of output classes, read from the final layer
    pub fn num_classes(&self) -> usize {
        self.fc2.weight.val().dims()[1]
    }

    /// Verify every parameter has the shape this topology requires for
    /// `num_classes` outputs
    pub fn check_parameter_shapes(&self, num_classes: usize) -> crate::utils::error::Result<()> {
        let convs = [&self.conv1, &self.conv2, &self.conv3];
        for (i, (block, (c_in, c_out))) in convs.iter().zip(CONV_CHANNELS).enumerate() {
            let found = block.conv.weight.val().dims();
            let expected = [c_out, c_in, 3, 3];
            if found != expected {
                return Err(PlantDocError::ShapeMismatch(format!(
                    "conv{} weight has shape {:?}, expected {:?}",
                    i + 1,
                    found,
                    expected
                )));
            }
        }

        let fc1 = self.fc1.weight.val().dims();
        if fc1 != [FEATURE_DIM, HIDDEN_DIM] {
            return Err(PlantDocError::ShapeMismatch(format!(
                "fc1 weight has shape {:?}, expected {:?}",
                fc1,
                [FEATURE_DIM, HIDDEN_DIM]
            )));
        }

        let fc2 = self.fc2.weight.val().dims();
        if fc2 != [HIDDEN_DIM, num_classes] {
            return Err(PlantDocError::ShapeMismatch(format!(
                "stored parameters produce {} classes but the label space has {}",
                fc2[1], num_classes
            )));
        }

        Ok(())
    }
}
